//! 输出文档模板
//!
//! 章节模板在首次使用时解析一次，之后每个章节克隆一份填入标题与内容。

use once_cell::sync::Lazy;

use crate::epub::xml::{Document, Element, XHTML_NS};

/// 双语章节的固定模板，译文块追加到 `body/div` 中
const CHAPTER_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title>TITLE</title>
<meta http-equiv="Content-Type" content="text/html; charset=utf-8"/>
<link rel="stylesheet" type="text/css" href="view.css"/>
</head>
<body>
<div class="bilingual">
</div>
</body>
</html>
"#;

static CHAPTER: Lazy<Document> = Lazy::new(|| {
    Document::parse(CHAPTER_TEMPLATE).expect("内置章节模板必须是合法的XML")
});

/// 原文段落的样式类
pub const SOURCE_CLASS: &str = "src";
/// 译文段落的样式类
pub const TRANSLATION_CLASS: &str = "trans";

/// 共享样式表的默认文件名
pub const STYLESHEET_NAME: &str = "view.css";

/// 共享样式表内容
pub const STYLESHEET: &str = "\
body {
  margin: 0 1em;
}

p.src {
  margin: 0.8em 0 0.2em 0;
}

p.trans {
  margin: 0 0 0.8em 0;
  color: #555555;
  font-style: italic;
}

div.cover {
  text-align: center;
  height: 100%;
}

div.cover img {
  max-width: 100%;
  max-height: 100%;
}
";

/// 内容容器在模板中的路径
const CONTAINER_PATH: [&str; 2] = ["body", "div"];

/// 克隆章节模板并填入标题与样式表链接
pub fn chapter_document(title: &str, stylesheet_href: &str) -> Document {
    let mut document = CHAPTER.clone();
    if let Some(title_element) = document.root.find_path_mut(&["head", "title"]) {
        title_element.set_text(title);
    }
    if let Some(link) = document.root.find_path_mut(&["head", "link"]) {
        link.set_attribute("href", stylesheet_href);
    }
    document
}

/// 章节模板中用于存放正文的空容器
pub fn chapter_container_mut(document: &mut Document) -> Option<&mut Element> {
    document.root.find_path_mut(&CONTAINER_PATH)
}

pub fn chapter_container(document: &Document) -> Option<&Element> {
    document.root.find_path(&CONTAINER_PATH)
}

/// 生成封面页
pub fn cover_page(cover_href: &str, title: &str, stylesheet_href: &str) -> Document {
    let head = Element::new("head")
        .with_child(Element::new("title").with_text(title))
        .with_child(
            Element::new("link")
                .with_attribute("rel", "stylesheet")
                .with_attribute("type", "text/css")
                .with_attribute("href", stylesheet_href),
        );

    let body = Element::new("body").with_child(
        Element::new("div").with_attribute("class", "cover").with_child(
            Element::new("img")
                .with_attribute("src", cover_href)
                .with_attribute("alt", title),
        ),
    );

    let root = Element::new("html")
        .with_attribute("xmlns", XHTML_NS)
        .with_child(head)
        .with_child(body);

    Document::new(root)
}
