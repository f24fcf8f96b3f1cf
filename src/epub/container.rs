//! container.xml 的读写
//!
//! 读取时只关心 `rootfiles/rootfile` 条目；写出时只生成指向单个OPF文件的容器描述。

use crate::epub::error::{EpubError, Result};
use crate::epub::xml::{CONTAINER_NS, Document, Element, Node};

/// OPF包文档的媒体类型
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// 一个rootfile条目
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    /// 压缩包内的完整路径
    pub full_path: String,
    pub media_type: String,
}

/// container.xml描述的全部rootfile
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// 缺少 `full-path` 的条目会被忽略，一个有效条目都没有时返回错误。
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let document = Document::parse(xml_content)
            .map_err(|e| EpubError::ContainerParseError(e.to_string()))?;

        if document.root.local_name() != "container" {
            return Err(EpubError::ContainerParseError(format!(
                "根元素应为container，实际为{}",
                document.root.name
            )));
        }

        let rootfiles: Vec<RootFile> = document
            .root
            .child("rootfiles")
            .map(|rootfiles| {
                rootfiles
                    .children
                    .iter()
                    .filter_map(|node| match node {
                        Node::Element(element) if element.local_name() == "rootfile" => Some(element),
                        _ => None,
                    })
                    .filter_map(|element| {
                        let full_path = element.attribute("full-path")?.trim();
                        if full_path.is_empty() {
                            return None;
                        }
                        Some(RootFile {
                            full_path: full_path.to_string(),
                            media_type: element.attribute("media-type").unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if rootfiles.is_empty() {
            return Err(EpubError::ContainerParseError("没有找到任何rootfile条目".to_string()));
        }

        Ok(Container { rootfiles })
    }

    /// 获取主要的OPF文件路径
    ///
    /// 优先取媒体类型为OPF的条目，没有时退回第一个条目。
    pub fn get_opf_path(&self) -> Option<String> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == OPF_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.clone())
    }

    /// 创建只指向一个OPF文件的容器描述
    pub fn for_package(opf_path: &str) -> Container {
        Container {
            rootfiles: vec![RootFile {
                full_path: opf_path.to_string(),
                media_type: OPF_MEDIA_TYPE.to_string(),
            }],
        }
    }

    /// 生成container.xml内容
    pub fn to_xml(&self) -> Result<String> {
        let mut rootfiles = Element::new("rootfiles");
        for rootfile in &self.rootfiles {
            rootfiles = rootfiles.with_child(
                Element::new("rootfile")
                    .with_attribute("full-path", rootfile.full_path.as_str())
                    .with_attribute("media-type", rootfile.media_type.as_str()),
            );
        }

        let root = Element::new("container")
            .with_attribute("version", "1.0")
            .with_attribute("xmlns", CONTAINER_NS)
            .with_child(rootfiles);

        Document::new(root).to_pretty_xml_string()
    }
}
