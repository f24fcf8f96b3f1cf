//! 章节转换模块
//!
//! 按文档顺序遍历章节 `body` 的顶层节点：正文段落被切分成段落块，每块输出一对
//! 原文/译文段落；其余节点（标题、图片、列表等）原样复制。输入树只读，输出树单独构建。

use std::num::NonZeroUsize;

use crate::bilingual::segmenter::segment;
use crate::bilingual::templates::{self, SOURCE_CLASS, STYLESHEET_NAME, TRANSLATION_CLASS};
use crate::bilingual::translator::Translator;
use crate::epub::error::{EpubError, Result};
use crate::epub::xml::{Document, Element, Node};

/// 每处理多少个顶层节点报告一次进度
const PROGRESS_INTERVAL: usize = 10;

/// 单个章节的转换参数
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// 书名，填入输出章节的 `<title>`
    pub title: String,
    pub source_lang: String,
    pub target_lang: String,
    pub sentences_per_group: NonZeroUsize,
    /// 从本章节指向共享样式表的相对路径
    pub stylesheet_href: String,
}

impl TransformOptions {
    pub fn new(
        title: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        sentences_per_group: NonZeroUsize,
    ) -> Self {
        Self {
            title: title.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            sentences_per_group,
            stylesheet_href: STYLESHEET_NAME.to_string(),
        }
    }

    pub fn with_stylesheet_href(mut self, href: impl Into<String>) -> Self {
        self.stylesheet_href = href.into();
        self
    }
}

/// 章节 `body` 的顶层节点分类
#[derive(Debug, Clone, PartialEq)]
pub enum BodyNode<'a> {
    /// 可提取文本的段落，携带去掉首尾空白后的文本
    ProsePara(String),
    /// 其他节点，原样复制
    Opaque(&'a Node),
}

impl<'a> BodyNode<'a> {
    /// 对顶层节点分类，仅含空白的文本节点返回None
    pub fn classify(node: &'a Node) -> Option<BodyNode<'a>> {
        match node {
            Node::Element(element) if element.local_name() == "p" => {
                let text = element.text_content().trim().to_string();
                if text.is_empty() {
                    Some(BodyNode::Opaque(node))
                } else {
                    Some(BodyNode::ProsePara(text))
                }
            }
            _ if node.is_whitespace() => None,
            _ => Some(BodyNode::Opaque(node)),
        }
    }
}

/// 转换一个章节
///
/// 任一段落块翻译失败时整章失败，不返回部分结果。
pub fn transform<T>(chapter: &Document, options: &TransformOptions, translator: &T) -> Result<Document>
where
    T: Translator + ?Sized,
{
    let body = chapter
        .root
        .child("body")
        .ok_or_else(|| EpubError::InvalidEpub("章节缺少<body>元素".to_string()))?;

    let mut output = templates::chapter_document(&options.title, &options.stylesheet_href);
    carry_namespace_declarations(&chapter.root, &mut output.root);

    let nodes: Vec<BodyNode> = body.children.iter().filter_map(BodyNode::classify).collect();
    let total = nodes.len();

    let mut content = vec![Node::text("\n")];
    for (index, node) in nodes.into_iter().enumerate() {
        match node {
            BodyNode::ProsePara(text) => {
                for chunk in segment(&text, options.sentences_per_group) {
                    let translated = translator.translate(&chunk, &options.source_lang, &options.target_lang)?;
                    content.push(paragraph(SOURCE_CLASS, chunk));
                    content.push(Node::text("\n"));
                    content.push(paragraph(TRANSLATION_CLASS, translated));
                    content.push(Node::text("\n"));
                }
            }
            BodyNode::Opaque(node) => {
                let mut node = node.clone();
                if let Node::Element(element) = &mut node {
                    element.add_class(SOURCE_CLASS);
                }
                content.push(node);
                content.push(Node::text("\n"));
            }
        }

        let processed = index + 1;
        if processed % PROGRESS_INTERVAL == 0 {
            log::info!("  {}/{}", processed, total);
        }
    }

    let container = templates::chapter_container_mut(&mut output)
        .ok_or_else(|| EpubError::Serialization("章节模板缺少内容容器".to_string()))?;
    container.children = content;

    Ok(output)
}

/// 转换章节XHTML文本并序列化结果
pub fn transform_xhtml<T>(xhtml: &str, options: &TransformOptions, translator: &T) -> Result<String>
where
    T: Translator + ?Sized,
{
    let chapter = Document::parse(xhtml)?;
    transform(&chapter, options, translator)?.to_xml_string()
}

fn paragraph(class: &str, text: String) -> Node {
    Node::Element(Element::new("p").with_attribute("class", class).with_text(text))
}

/// 把原章节根元素上的前缀命名空间声明带到输出根元素，保证复制的节点仍然合法
fn carry_namespace_declarations(source: &Element, target: &mut Element) {
    for (key, value) in &source.attributes {
        if key.starts_with("xmlns:") && target.attribute(key).is_none() {
            target.set_attribute(key.as_str(), value.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn options(sentences: usize) -> TransformOptions {
        TransformOptions::new("Book", "fr", "en", n(sentences))
    }

    fn upper(text: &str, _: &str, _: &str) -> Result<String> {
        Ok(text.to_uppercase())
    }

    fn container_elements(document: &Document) -> Vec<Element> {
        templates::chapter_container(document)
            .unwrap()
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element.clone()),
                _ => None,
            })
            .collect()
    }

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Chapter</title></head>
<body>
<h1 class="chapter">Title</h1>
<p>Hello world.</p>
</body>
</html>"#;

    #[test]
    fn test_heading_then_pair() {
        let chapter = Document::parse(CHAPTER).unwrap();
        let output = transform(&chapter, &options(2), &upper).unwrap();
        let elements = container_elements(&output);

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].local_name(), "h1");
        assert_eq!(elements[0].attribute("class"), Some("chapter src"));
        assert_eq!(elements[0].text_content(), "Title");

        assert_eq!(elements[1].attribute("class"), Some("src"));
        assert_eq!(elements[1].text_content(), "Hello world.");
        assert_eq!(elements[2].attribute("class"), Some("trans"));
        assert_eq!(elements[2].text_content(), "HELLO WORLD.");

        let title = output.root.find_path(&["head", "title"]).unwrap();
        assert_eq!(title.text_content(), "Book");
        assert_eq!(output.root.attribute("xmlns:epub"), Some("http://www.idpf.org/2007/ops"));
    }

    #[test]
    fn test_long_paragraph_becomes_several_pairs() {
        let xhtml = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<p>One. <b>Two</b>. Three. Four. Five.</p>
<img src="a.png"/>
</body></html>"#;
        let chapter = Document::parse(xhtml).unwrap();
        let output = transform(&chapter, &options(2), &upper).unwrap();
        let texts: Vec<(String, String)> = container_elements(&output)
            .iter()
            .map(|e| (e.attribute("class").unwrap_or_default().to_string(), e.text_content()))
            .collect();

        assert_eq!(
            texts,
            vec![
                ("src".to_string(), "One. Two.".to_string()),
                ("trans".to_string(), "ONE. TWO.".to_string()),
                ("src".to_string(), "Three. Four.".to_string()),
                ("trans".to_string(), "THREE. FOUR.".to_string()),
                ("src".to_string(), "Five.".to_string()),
                ("trans".to_string(), "FIVE.".to_string()),
                ("src".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_empty_paragraph_copied_unchanged() {
        let xhtml = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p id="gap">  </p><ul><li>item</li></ul></body></html>"#;
        let chapter = Document::parse(xhtml).unwrap();
        let calls = RefCell::new(Vec::new());
        let recorder = |text: &str, _: &str, _: &str| -> Result<String> {
            calls.borrow_mut().push(text.to_string());
            Ok(text.to_string())
        };

        let output = transform(&chapter, &options(1), &recorder).unwrap();
        let elements = container_elements(&output);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].attribute("id"), Some("gap"));
        assert_eq!(elements[1].local_name(), "ul");
        assert_eq!(elements[1].text_content(), "item");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_translator_receives_languages() {
        let chapter = Document::parse(CHAPTER).unwrap();
        let seen = RefCell::new(Vec::new());
        let recorder = |text: &str, source: &str, target: &str| -> Result<String> {
            seen.borrow_mut().push((text.to_string(), source.to_string(), target.to_string()));
            Ok(String::from("x"))
        };

        transform(&chapter, &options(2), &recorder).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![("Hello world.".to_string(), "fr".to_string(), "en".to_string())]
        );
    }

    #[test]
    fn test_translation_failure_fails_chapter() {
        let chapter = Document::parse(CHAPTER).unwrap();
        let failing = |text: &str, _: &str, _: &str| -> Result<String> {
            Err(EpubError::translation(text, 1, "offline"))
        };

        let result = transform(&chapter, &options(2), &failing);
        assert!(matches!(result, Err(EpubError::Translation { .. })));
    }

    #[test]
    fn test_output_is_deterministic() {
        let fixed = |_: &str, _: &str, _: &str| -> Result<String> { Ok("fixed".to_string()) };
        let first = transform_xhtml(CHAPTER, &options(1), &fixed).unwrap();
        let second = transform_xhtml(CHAPTER, &options(1), &fixed).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("<?xml"));
    }

    #[test]
    fn test_entities_reach_translator_decoded() {
        let xhtml = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<h1>R&eacute;sum&eacute; &amp; notes</h1>
<p>Caf&eacute; &amp; th&eacute;.</p>
</body></html>"#;
        let seen = RefCell::new(Vec::new());
        let recorder = |text: &str, _: &str, _: &str| -> Result<String> {
            seen.borrow_mut().push(text.to_string());
            Ok(text.to_uppercase())
        };

        let output = transform_xhtml(xhtml, &options(2), &recorder).unwrap();
        assert_eq!(*seen.borrow(), vec!["Café & thé.".to_string()]);
        assert!(output.contains(r#"<h1 class="src">Résumé &amp; notes</h1>"#));
        assert!(output.contains(r#"<p class="src">Café &amp; thé.</p>"#));
        assert!(output.contains(r#"<p class="trans">CAFÉ &amp; THÉ.</p>"#));
        assert!(!output.contains("&amp;amp;"));
    }

    #[test]
    fn test_missing_body_is_error() {
        let chapter = Document::parse(r#"<html xmlns="http://www.w3.org/1999/xhtml"><head/></html>"#).unwrap();
        assert!(transform(&chapter, &options(1), &upper).is_err());
    }

    #[test]
    fn test_input_chapter_not_mutated() {
        let chapter = Document::parse(CHAPTER).unwrap();
        let before = chapter.clone();
        transform(&chapter, &options(1), &upper).unwrap();
        assert_eq!(chapter, before);
    }
}
