//! OPF生成模块
//!
//! 以清单项、脊柱项的类型化列表构建输出书籍的OPF包文档，
//! 通过XML序列化器输出，不做字符串模板替换。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{ManifestItem, SpineItem};
use crate::epub::xml::{DC_NS, Document, Element, OPF_NS};
use std::collections::HashSet;

/// 唯一标识符元素使用的ID
pub const UNIQUE_IDENTIFIER_ID: &str = "BookId";

/// 待输出的OPF包文档
#[derive(Debug, Clone)]
pub struct PackageDocument {
    pub title: String,
    pub author: String,
    pub language: String,
    pub identifier: String,
    /// 封面图片的清单项ID
    pub cover_image_id: Option<String>,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// NCX目录文件的清单项ID
    pub spine_toc: Option<String>,
}

impl PackageDocument {
    /// 检查清单ID唯一、脊柱引用均存在
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        ids.insert(UNIQUE_IDENTIFIER_ID);
        for item in &self.manifest {
            if !ids.insert(item.id.as_str()) {
                return Err(EpubError::Serialization(format!("清单项ID重复: {}", item.id)));
            }
        }

        let references = self
            .spine
            .iter()
            .map(|item| item.idref.as_str())
            .chain(self.spine_toc.as_deref())
            .chain(self.cover_image_id.as_deref());
        for idref in references {
            if !self.manifest.iter().any(|item| item.id == idref) {
                return Err(EpubError::Serialization(format!("引用了不存在的清单项: {}", idref)));
            }
        }

        Ok(())
    }

    /// 生成OPF文件内容
    pub fn to_xml(&self) -> Result<String> {
        self.validate()?;

        let mut metadata = Element::new("metadata")
            .with_attribute("xmlns:dc", DC_NS)
            .with_attribute("xmlns:opf", OPF_NS)
            .with_child(Element::new("dc:title").with_text(self.title.as_str()))
            .with_child(
                Element::new("dc:creator")
                    .with_attribute("opf:role", "aut")
                    .with_text(self.author.as_str()),
            )
            .with_child(Element::new("dc:language").with_text(self.language.as_str()))
            .with_child(
                Element::new("dc:identifier")
                    .with_attribute("id", UNIQUE_IDENTIFIER_ID)
                    .with_text(self.identifier.as_str()),
            );
        if let Some(cover_id) = &self.cover_image_id {
            metadata = metadata.with_child(
                Element::new("meta")
                    .with_attribute("name", "cover")
                    .with_attribute("content", cover_id.as_str()),
            );
        }

        let mut manifest = Element::new("manifest");
        for item in &self.manifest {
            manifest = manifest.with_child(
                Element::new("item")
                    .with_attribute("id", item.id.as_str())
                    .with_attribute("href", item.href.as_str())
                    .with_attribute("media-type", item.media_type.as_str()),
            );
        }

        let mut spine = Element::new("spine");
        if let Some(toc) = &self.spine_toc {
            spine.set_attribute("toc", toc.as_str());
        }
        for item in &self.spine {
            spine = spine.with_child(
                Element::new("itemref")
                    .with_attribute("idref", item.idref.as_str())
                    .with_attribute("linear", item.linear_attribute()),
            );
        }

        let package = Element::new("package")
            .with_attribute("xmlns", OPF_NS)
            .with_attribute("version", "2.0")
            .with_attribute("unique-identifier", UNIQUE_IDENTIFIER_ID)
            .with_child(metadata)
            .with_child(manifest)
            .with_child(spine);

        Document::new(package).to_pretty_xml_string()
    }
}
