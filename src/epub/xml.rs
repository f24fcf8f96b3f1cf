//! XML文档树模块
//!
//! 基于quick-xml事件流构建的轻量级可变文档树，用于章节XHTML的读写，
//! 以及container.xml、OPF、封面页等包文档的结构化生成。

use crate::epub::error::{EpubError, Result};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// XHTML命名空间
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
/// OPF包命名空间
pub const OPF_NS: &str = "http://www.idpf.org/2007/opf";
/// Dublin Core命名空间
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
/// OCF容器命名空间
pub const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// 文档树中的节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// 已反转义的文本
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    /// 创建文本节点
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// 是否为仅包含空白字符的文本节点
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }

    /// 节点及其所有后代的文本内容
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Comment(_) => {}
        }
    }
}

/// 元素节点
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// 带前缀的限定名，如 `html`、`dc:title`
    pub name: String,
    /// 属性列表（保持原始顺序，值已反转义）
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// 链式设置属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// 链式追加文本子节点
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::text(text));
        self
    }

    /// 链式追加子元素
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// 去掉命名空间前缀后的本地名称
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 设置属性，已存在时覆盖原值
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// 向class属性追加一个样式类，已存在则不重复添加
    pub fn add_class(&mut self, class: &str) {
        let merged = match self.attribute("class") {
            Some(existing) if existing.split_whitespace().any(|c| c == class) => return,
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute("class", merged);
    }

    /// 用单个文本节点替换全部子节点
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::text(text)];
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// 按本地名称查找第一个子元素
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(element) if element.local_name() == local_name => Some(element),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.local_name() == local_name => Some(element),
            _ => None,
        })
    }

    /// 按本地名称路径逐级查找子元素，如 `["head", "title"]`
    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for name in path {
            current = current.child_mut(name)?;
        }
        Some(current)
    }

    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        let mut current = self;
        for name in path {
            current = current.child(name)?;
        }
        Some(current)
    }

    /// 解析开始标签
    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = attr_result?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            attributes.push((key, unescape(&raw)));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }
}

/// 完整的XML文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// DOCTYPE声明内容（不含 `<!DOCTYPE` 与 `>`）
    pub doctype: Option<String>,
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { doctype: None, root }
    }

    /// 解析XML文本为文档树
    ///
    /// 保留所有空白文本节点，以便原样复制的节点不改变其排版。
    pub fn parse(xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut doctype = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    stack.push(Element::from_start(e)?);
                }
                Event::Empty(ref e) => {
                    let element = Element::from_start(e)?;
                    attach(&mut stack, &mut root, Node::Element(element))?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        EpubError::InvalidEpub("XML结束标签没有匹配的开始标签".to_string())
                    })?;
                    attach(&mut stack, &mut root, Node::Element(element))?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::Text(unescape(&raw)));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::CData(raw));
                    }
                }
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::Comment(raw));
                    }
                }
                Event::DocType(e) => {
                    let raw = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                    doctype = Some(raw);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(EpubError::InvalidEpub(format!(
                "XML文档未闭合的元素: {}",
                stack.last().map(|e| e.name.as_str()).unwrap_or_default()
            )));
        }

        let root = root.ok_or_else(|| EpubError::InvalidEpub("XML文档没有根元素".to_string()))?;
        Ok(Document { doctype, root })
    }

    /// 序列化为带XML声明的文本，不添加额外缩进
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_prolog(&mut writer)?;
        write_element(&mut writer, &self.root)?;
        finish(writer)
    }

    /// 序列化为带缩进的文本，适用于不含混合内容的包文档
    pub fn to_pretty_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_prolog(&mut writer)?;
        write_element(&mut writer, &self.root)?;
        finish(writer)
    }

    fn write_prolog(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.get_mut().push(b'\n');
        if let Some(doctype) = &self.doctype {
            writer.write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))?;
            writer.get_mut().push(b'\n');
        }
        Ok(())
    }
}

/// 把闭合的节点挂到父元素上，没有父元素时作为根元素
fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    match node {
        Node::Element(element) if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        Node::Element(element) => Err(EpubError::InvalidEpub(format!(
            "XML文档存在多个根元素: {}",
            element.name
        ))),
        _ => Ok(()),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            Node::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| EpubError::Serialization(e.to_string()))
}

/// 逐个解析文本中的实体引用
///
/// 支持XML预定义实体、全部HTML5命名实体以及数字字符引用。无法识别的引用只保留它自身，
/// 同一段文本中的其他引用照常解析。
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let reference = after
            .find(';')
            .map(|end| &after[..end])
            .filter(|name| !name.is_empty() && !name.contains(|c: char| c == '&' || c.is_whitespace()));

        match reference.and_then(resolve_reference) {
            Some(resolved) => {
                out.push_str(&resolved);
                rest = &after[reference.map_or(0, str::len) + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// 解析 `&` 与 `;` 之间的引用名
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).filter(|c| *c != '\0').map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}
