//! 元数据处理模块
//!
//! 提供EPUB元数据的结构定义和处理功能。

use std::collections::HashMap;

/// 元数据值枚举，表示不同类型的元数据
#[derive(Debug, Clone)]
pub enum MetadataValue {
    /// EPUB规范的Dublin Core标签元数据
    DublinCore {
        /// 元素内容
        value: String,
        /// 元素属性（如 role, file-as, scheme等）
        attributes: HashMap<String, String>,
    },
    /// meta标签的自定义元数据
    Meta(MetaValue),
}

/// meta标签值枚举
#[derive(Debug, Clone)]
pub enum MetaValue {
    /// 基于name属性的meta标签，如 <meta name="cover" content="cover.jpg"/>
    NameBased {
        /// content属性值
        content: String,
    },
    /// 基于property属性的meta标签，如 <meta property="dcterms:modified">2025-06-05T11:24:01Z</meta>
    PropertyBased {
        /// 标签内容
        content: String,
    },
    /// 基于refines属性的meta标签，如 <meta refines="#creator" property="role">aut</meta>
    RefinesBased {
        /// 被精化的元素ID（不包含#前缀）
        refines_id: String,
        /// property属性值（如role、file-as等）
        property: String,
        /// 标签内容
        content: String,
    },
}

impl MetaValue {
    fn content(&self) -> &str {
        match self {
            MetaValue::NameBased { content }
            | MetaValue::PropertyBased { content }
            | MetaValue::RefinesBased { content, .. } => content,
        }
    }
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    /// 创建者姓名
    pub name: String,
    /// 角色(如author、editor等)
    pub role: Option<String>,
    /// 元素ID（用于关联refines元数据）
    pub id: Option<String>,
}

impl Creator {
    /// 是否为作者角色（EPUB2的opf:role或EPUB3的refines）
    pub fn is_author(&self) -> bool {
        matches!(self.role.as_deref(), Some("aut") | Some("author"))
    }
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// 标识符值
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    pub id: Option<String>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// 原始元数据映射：key为去掉前缀的标签名（如"title"、"cover"），value按出现顺序保存
    raw_metadata: HashMap<String, Vec<MetadataValue>>,
    /// 关联元数据映射：key为被精化的元素ID
    refines_metadata: HashMap<String, Vec<MetaValue>>,
}

impl Metadata {
    /// 创建新的元数据实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元数据
    pub fn add_dublin_core(&mut self, tag: String, value: String, attributes: HashMap<String, String>) {
        self.raw_metadata
            .entry(tag)
            .or_default()
            .push(MetadataValue::DublinCore { value, attributes });
    }

    /// 添加基于name的meta元数据
    pub fn add_meta_name_based(&mut self, name: String, content: String) {
        self.raw_metadata
            .entry(name)
            .or_default()
            .push(MetadataValue::Meta(MetaValue::NameBased { content }));
    }

    /// 添加基于property的meta元数据
    pub fn add_meta_property_based(&mut self, property: String, content: String) {
        self.raw_metadata
            .entry(property)
            .or_default()
            .push(MetadataValue::Meta(MetaValue::PropertyBased { content }));
    }

    /// 添加基于refines的meta元数据
    pub fn add_meta_refines_based(&mut self, refines_id: String, property: String, content: String) {
        self.refines_metadata
            .entry(refines_id.clone())
            .or_default()
            .push(MetaValue::RefinesBased {
                refines_id,
                property,
                content,
            });
    }

    fn first_content(&self, tag: &str) -> Option<String> {
        self.raw_metadata
            .get(tag)?
            .iter()
            .map(Self::extract_content)
            .find(|content| !content.is_empty())
    }

    /// 获取标题
    pub fn title(&self) -> Option<String> {
        self.first_content("title")
    }

    /// 获取语言
    pub fn language(&self) -> Option<String> {
        self.first_content("language")
    }

    /// 获取封面信息（`<meta name="cover">`的content，通常是清单项ID）
    pub fn cover(&self) -> Option<String> {
        self.first_content("cover")
    }

    /// 获取所有创建者
    pub fn creators(&self) -> Vec<Creator> {
        self.raw_metadata
            .get("creator")
            .map(|values| values.iter().map(|v| self.extract_creator(v)).collect())
            .unwrap_or_default()
    }

    /// 获取作者：优先取角色为作者的创建者，否则取第一个创建者
    pub fn author(&self) -> Option<String> {
        let creators = self.creators();
        creators
            .iter()
            .find(|creator| creator.is_author())
            .or_else(|| creators.first())
            .map(|creator| creator.name.clone())
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.raw_metadata
            .get("identifier")
            .map(|values| {
                values
                    .iter()
                    .map(|value| match value {
                        MetadataValue::DublinCore { value, attributes } => Identifier {
                            value: value.clone(),
                            scheme: attributes.get("scheme").cloned(),
                            id: attributes.get("id").cloned(),
                        },
                        MetadataValue::Meta(meta) => Identifier {
                            value: meta.content().to_string(),
                            scheme: None,
                            id: None,
                        },
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 从元数据值中提取内容
    fn extract_content(value: &MetadataValue) -> String {
        match value {
            MetadataValue::DublinCore { value, .. } => value.clone(),
            MetadataValue::Meta(meta) => meta.content().to_string(),
        }
    }

    /// 从元数据值中提取创建者信息（支持EPUB3的refines关联）
    fn extract_creator(&self, value: &MetadataValue) -> Creator {
        match value {
            MetadataValue::DublinCore { value, attributes } => {
                let mut creator = Creator {
                    name: value.clone(),
                    role: attributes.get("role").cloned(),
                    id: attributes.get("id").cloned(),
                };

                if let Some(refines_list) = creator.id.as_ref().and_then(|id| self.refines_metadata.get(id)) {
                    for refines in refines_list {
                        if let MetaValue::RefinesBased { property, content, .. } = refines {
                            if property == "role" {
                                creator.role = Some(content.clone());
                            }
                        }
                    }
                }

                creator
            }
            MetadataValue::Meta(meta) => Creator {
                name: meta.content().to_string(),
                role: None,
                id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_author_prefers_aut_role() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("creator".to_string(), "Editor".to_string(), attrs(&[("role", "edt")]));
        metadata.add_dublin_core("creator".to_string(), "Writer".to_string(), attrs(&[("role", "aut")]));

        assert_eq!(metadata.author(), Some("Writer".to_string()));
    }

    #[test]
    fn test_author_falls_back_to_first_creator() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("creator".to_string(), "Someone".to_string(), HashMap::new());
        assert_eq!(metadata.author(), Some("Someone".to_string()));

        assert_eq!(Metadata::new().author(), None);
    }

    #[test]
    fn test_refines_role_marks_author() {
        let mut metadata = Metadata::new();
        metadata.add_dublin_core("creator".to_string(), "Other".to_string(), attrs(&[("id", "c0")]));
        metadata.add_dublin_core("creator".to_string(), "J.K. Rowling".to_string(), attrs(&[("id", "c1")]));
        metadata.add_meta_refines_based("c1".to_string(), "role".to_string(), "aut".to_string());

        let creators = metadata.creators();
        assert_eq!(creators.len(), 2);
        assert!(creators[1].is_author());
        assert_eq!(metadata.author(), Some("J.K. Rowling".to_string()));
    }

    #[test]
    fn test_cover_and_identifiers() {
        let mut metadata = Metadata::new();
        metadata.add_meta_name_based("cover".to_string(), "cover-img".to_string());
        metadata.add_dublin_core(
            "identifier".to_string(),
            "978-1234567890".to_string(),
            attrs(&[("id", "BookId"), ("scheme", "ISBN")]),
        );

        assert_eq!(metadata.cover(), Some("cover-img".to_string()));
        let identifiers = metadata.identifiers();
        assert_eq!(identifiers.len(), 1);
        assert_eq!(identifiers[0].scheme.as_deref(), Some("ISBN"));
        assert_eq!(identifiers[0].id.as_deref(), Some("BookId"));
    }
}
