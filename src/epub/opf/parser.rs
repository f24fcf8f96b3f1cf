//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::error::Result;
use crate::epub::opf::{
    metadata::Metadata,
    manifest::ManifestItem,
    spine::SpineItem,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// 元数据
    pub metadata: Metadata,
    /// 清单项(保持文档中的出现顺序)
    pub manifest: Vec<ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
    /// 脊柱的目录引用
    pub spine_toc: Option<String>,
}

/// 解析时所处的OPF区段
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

impl Opf {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<Opf, EpubError>` - 解析后的OPF信息
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut version = String::new();
        let mut metadata = Metadata::new();
        let mut manifest = Vec::new();
        let mut spine = Vec::new();
        let mut spine_toc = None;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut text_content = String::new();
        let mut current_attributes = HashMap::new();
        // (refines目标ID, property)，等待meta的文本内容
        let mut pending_refines: Option<(String, String)> = None;
        let mut pending_property: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name_bytes = e.local_name();
                    let local_name = String::from_utf8_lossy(local_name_bytes.as_ref());

                    match (local_name.as_ref(), section) {
                        ("package", _) => {
                            version = Self::attribute(e, b"version")?.unwrap_or_default();
                        }
                        ("metadata", _) => section = Section::Metadata,
                        ("manifest", _) => section = Section::Manifest,
                        ("spine", _) => {
                            section = Section::Spine;
                            spine_toc = Self::attribute(e, b"toc")?;
                        }
                        ("item", Section::Manifest) => {
                            if let Some(item) = Self::parse_manifest_item(e)? {
                                manifest.push(item);
                            }
                        }
                        ("itemref", Section::Spine) => {
                            if let Some(item) = Self::parse_spine_item(e)? {
                                spine.push(item);
                            }
                        }
                        ("meta", Section::Metadata) => {
                            let attributes = Self::collect_attributes(e)?;
                            Self::handle_meta_start_tag(
                                &attributes,
                                &mut metadata,
                                &mut pending_refines,
                                &mut pending_property,
                            );
                            text_content.clear();
                        }
                        (_, Section::Metadata) => {
                            current_attributes = Self::collect_attributes(e)?;
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name_bytes = e.local_name();
                    let local_name = String::from_utf8_lossy(local_name_bytes.as_ref());

                    match (local_name.as_ref(), section) {
                        ("metadata" | "manifest" | "spine", _) => section = Section::None,
                        ("meta", Section::Metadata) => {
                            let content = text_content.trim().to_string();
                            if let Some((refines_id, property)) = pending_refines.take() {
                                metadata.add_meta_refines_based(refines_id, property, content);
                            } else if let Some(property) = pending_property.take() {
                                metadata.add_meta_property_based(property, content);
                            }
                        }
                        (_, Section::Metadata) => {
                            // quick_xml的local_name()会忽略命名空间前缀，<dc:title>解析为"title"
                            let content = text_content.trim();
                            if !content.is_empty() {
                                metadata.add_dublin_core(
                                    local_name.to_string(),
                                    content.to_string(),
                                    current_attributes.clone(),
                                );
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    text_content.push_str(&e.unescape()?);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Opf {
            version,
            metadata,
            manifest,
            spine,
            spine_toc,
        })
    }

    /// 读取单个属性（按本地名称匹配）
    fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
        for attr_result in e.attributes() {
            let attr = attr_result?;
            if attr.key.local_name().as_ref() == key {
                return Ok(Some(attr.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    /// 收集元素的全部属性，key为本地名称（`opf:role` → `role`）
    fn collect_attributes(e: &BytesStart) -> Result<HashMap<String, String>> {
        let mut attributes = HashMap::new();
        for attr_result in e.attributes() {
            let attr = attr_result?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr.unescape_value()?.into_owned();
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    /// 处理meta开始标签
    ///
    /// name/content形式立即写入；refines与property形式需要等到结束标签拿到文本内容，
    /// 但若content在属性中则直接写入。
    fn handle_meta_start_tag(
        attributes: &HashMap<String, String>,
        metadata: &mut Metadata,
        pending_refines: &mut Option<(String, String)>,
        pending_property: &mut Option<String>,
    ) {
        let name = attributes.get("name");
        let content = attributes.get("content");
        let property = attributes.get("property");
        let refines = attributes
            .get("refines")
            .map(|r| r.trim_start_matches('#').to_string());

        if let (Some(name), Some(content)) = (name, content) {
            if !name.is_empty() && !content.is_empty() {
                metadata.add_meta_name_based(name.clone(), content.clone());
            }
        }

        match (refines, property) {
            (Some(refines), Some(property)) if !refines.is_empty() => match content {
                Some(content) if !content.is_empty() => {
                    metadata.add_meta_refines_based(refines, property.clone(), content.clone());
                }
                _ => *pending_refines = Some((refines, property.clone())),
            },
            (None, Some(property)) if !property.is_empty() => {
                *pending_property = Some(property.clone());
            }
            _ => {}
        }
    }

    /// 解析清单项
    fn parse_manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
        let attributes = Self::collect_attributes(e)?;
        let (Some(id), Some(href), Some(media_type)) = (
            attributes.get("id"),
            attributes.get("href"),
            attributes.get("media-type"),
        ) else {
            return Ok(None);
        };

        if id.is_empty() || href.is_empty() || media_type.is_empty() {
            return Ok(None);
        }

        let mut item = ManifestItem::new(id.as_str(), href.as_str(), media_type.as_str());
        item.properties = attributes.get("properties").cloned();
        Ok(Some(item))
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart) -> Result<Option<SpineItem>> {
        let attributes = Self::collect_attributes(e)?;
        let Some(idref) = attributes.get("idref").filter(|idref| !idref.is_empty()) else {
            return Ok(None);
        };

        let mut item = SpineItem::new(idref.as_str());
        item.linear = attributes.get("linear").map(String::as_str) != Some("no");
        Ok(Some(item))
    }

    /// 根据ID获取清单项
    pub fn get_manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// 根据href获取清单项
    pub fn get_manifest_item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.href == href)
    }

    /// 获取封面路径(综合检查多种方式)
    ///
    /// # 返回值
    /// * `Option<String>` - 相对于OPF文件的封面路径
    pub fn get_cover_path(&self) -> Option<String> {
        // 首先检查manifest中具有cover-image属性的项目
        if let Some(item) = self.manifest.iter().find(|item| item.is_cover_image()) {
            return Some(item.href.clone());
        }

        // 然后检查metadata中的cover信息
        let cover = self.metadata.cover()?;
        // 如果cover是ID，查找对应的manifest项，否则当作文件路径
        match self.get_manifest_item(&cover) {
            Some(item) => Some(item.href.clone()),
            None => Some(cover),
        }
    }

    /// 按清单顺序获取所有需要处理的章节
    pub fn chapter_items(&self) -> Vec<&ManifestItem> {
        self.manifest.iter().filter(|item| item.is_chapter()).collect()
    }

    /// 获取NCX目录文件对应的清单项
    pub fn get_ncx_item(&self) -> Option<&ManifestItem> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.get_manifest_item(id))
            .or_else(|| self.manifest.iter().find(|item| item.is_ncx()))
    }
}
