//! 双语书籍打包模块
//!
//! 读取原书的container与OPF，按清单顺序处理章节：前 `skip_sections` 个章节原样保留，
//! 其余章节交给转换模块生成双语版本。生成的封面页、样式表、原书的其他资源
//! 与新的OPF一起放入工作树，最后由 [`EpubWriter`] 写出。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::bilingual::templates::{self, STYLESHEET, STYLESHEET_NAME};
use crate::bilingual::transformer::{TransformOptions, transform};
use crate::bilingual::translator::Translator;
use crate::config::BilingualConfig;
use crate::epub::container::Container;
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{
    ManifestItem, Opf, PackageDocument, SpineItem, UNIQUE_IDENTIFIER_ID, XHTML_MEDIA_TYPE,
    image_media_type,
};
use crate::epub::reader::{
    BookInfo, ChapterInfo, CoverImage, Epub, book_info_from_opf, chapters_from_opf, parent_directory,
    resolve_href,
};
use crate::epub::writer::{EpubWriter, WorkingTree};
use crate::epub::xml::Document;

/// 生成的封面图片清单项ID
pub const COVER_IMAGE_ID: &str = "cover-image";
/// 生成的封面页清单项ID
pub const COVER_PAGE_ID: &str = "cover";
/// 共享样式表清单项ID
pub const STYLESHEET_ID: &str = "bilingual-css";

const COVER_PAGE_NAME: &str = "cover.xhtml";
const CSS_MEDIA_TYPE: &str = "text/css";
const CONTAINER_PATH: &str = "META-INF/container.xml";

/// 打包参数
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub target_language: String,
    /// 缺省时使用书籍的dc:language
    pub source_language: Option<String>,
    pub skip_sections: usize,
    pub sentences_per_paragraph: NonZeroUsize,
    /// 替换原书封面的图片文件
    pub cover_image: Option<PathBuf>,
    /// 翻译失败时中止整个转换
    pub strict: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self::from_config(&BilingualConfig::default_config())
    }
}

impl AssembleOptions {
    pub fn from_config(config: &BilingualConfig) -> Self {
        Self {
            target_language: config.target_language.clone(),
            source_language: config.source_language.clone(),
            skip_sections: config.skip_sections,
            sentences_per_paragraph: config.sentences_per_paragraph,
            cover_image: None,
            strict: config.strict,
        }
    }
}

/// 翻译失败后原样保留的章节
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterFailure {
    pub href: String,
    pub error: String,
}

/// 一次转换的结果汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub title: String,
    pub source_language: String,
    pub target_language: String,
    /// 已生成双语版本的章节
    pub translated: Vec<String>,
    /// 按设置跳过、原样保留的章节
    pub skipped: Vec<String>,
    pub failed: Vec<ChapterFailure>,
    /// 输出包中的文件数
    pub entries: usize,
}

impl AssemblyReport {
    /// 所有需要翻译的章节都已成功翻译
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 分配清单项ID，保证唯一且是合法的XML名称
#[derive(Debug, Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn new() -> Self {
        let mut used = HashSet::new();
        used.insert(UNIQUE_IDENTIFIER_ID.to_string());
        Self { used }
    }

    fn allocate(&mut self, preferred: &str) -> String {
        let base = xml_name(preferred);
        let mut candidate = base.clone();
        let mut counter = 1;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}-{}", base, counter);
            counter += 1;
        }
        candidate
    }
}

/// 把任意字符串转换为合法的XML名称
fn xml_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match name.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        Some(_) => name.insert_str(0, "item-"),
        None => name.push_str("item"),
    }
    name
}

/// 章节ID取自href去掉扩展名后的文件名
fn chapter_id(href: &str) -> String {
    let path = href.split('#').next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    stem.to_string()
}

/// 在已占用的href之外选择一个可用名称，冲突时在扩展名前加序号
fn unique_href(preferred: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(preferred) {
        return preferred.to_string();
    }

    let (stem, extension) = match preferred.rsplit_once('.') {
        Some((stem, extension)) => (stem, format!(".{}", extension)),
        None => (preferred, String::new()),
    };
    let mut counter = 1;
    loop {
        let candidate = format!("{}-{}{}", stem, counter, extension);
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// 计算从 `from` 文件指向 `to` 文件的相对链接（均为压缩包内路径）
pub fn relative_href(from: &str, to: &str) -> String {
    let from_dir = parent_directory(from);
    let from_parts: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    // 目标文件名本身不参与公共前缀比较
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take(to_parts.len().saturating_sub(1))
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; from_parts.len() - common];
    segments.extend(&to_parts[common..]);
    segments.join("/")
}

/// 封面图片在输出包中的位置
struct CoverPlan {
    /// 封面图片清单项ID
    id: String,
    href: String,
    archive_path: String,
    /// 需要新写入的图片数据；沿用原书清单中的图片时为None
    data: Option<Vec<u8>>,
    media_type: String,
}

/// 组装双语书籍的工作树
///
/// 返回尚未写出的工作树与结果汇总。
pub fn assemble<T>(epub: &mut Epub, options: &AssembleOptions, translator: &T) -> Result<(WorkingTree, AssemblyReport)>
where
    T: Translator + ?Sized,
{
    let opf_path = epub.get_opf_path()?;
    let opf = epub.parse_opf()?;
    let opf_dir = parent_directory(&opf_path);
    let book = book_info_from_opf(&opf)?;
    let chapters = chapters_from_opf(&opf, &opf_dir);
    if chapters.is_empty() {
        return Err(EpubError::MalformedPackage("清单中没有任何XHTML章节".to_string()));
    }

    let source_language = options
        .source_language
        .clone()
        .unwrap_or_else(|| book.language.clone());
    log::info!(
        "《{}》共 {} 个章节，{} -> {}，跳过前 {} 个",
        book.title,
        chapters.len(),
        source_language,
        options.target_language,
        options.skip_sections
    );

    let mut ids = IdAllocator::new();
    let mut taken_hrefs: HashSet<String> = opf.manifest.iter().map(|item| item.href.clone()).collect();

    let cover_page_id = ids.allocate(COVER_PAGE_ID);
    let stylesheet_id = ids.allocate(STYLESHEET_ID);
    let cover_page_href = unique_href(COVER_PAGE_NAME, &taken_hrefs);
    taken_hrefs.insert(cover_page_href.clone());
    let stylesheet_href = unique_href(STYLESHEET_NAME, &taken_hrefs);
    taken_hrefs.insert(stylesheet_href.clone());

    let chapter_ids: Vec<String> = chapters.iter().map(|chapter| ids.allocate(&chapter_id(&chapter.href))).collect();

    // 原书中非章节的资源保留原ID（可用时）
    let mut asset_ids: HashMap<String, String> = HashMap::new();
    for item in opf.manifest.iter().filter(|item| !item.is_chapter()) {
        asset_ids.insert(item.id.clone(), ids.allocate(&item.id));
    }

    let cover = plan_cover(epub, &opf, &opf_dir, options, &asset_ids, &mut ids, &mut taken_hrefs)?;

    let stylesheet_path = resolve_href(&opf_dir, &stylesheet_href);
    let cover_page_path = resolve_href(&opf_dir, &cover_page_href);

    let mut tree = WorkingTree::with_mimetype();
    tree.insert(CONTAINER_PATH, Container::for_package(&opf_path).to_xml()?)?;
    // OPF要等所有章节处理完才能生成，其余文件先暂存
    let mut manifest = vec![
        ManifestItem::new(cover_page_id.as_str(), cover_page_href.as_str(), XHTML_MEDIA_TYPE),
        ManifestItem::new(stylesheet_id.as_str(), stylesheet_href.as_str(), CSS_MEDIA_TYPE),
    ];
    let mut spine = vec![SpineItem::new(cover_page_id.as_str())];

    let cover_page = templates::cover_page(
        &relative_href(&cover_page_path, &cover.archive_path),
        &book.title,
        &relative_href(&cover_page_path, &stylesheet_path),
    );
    let mut pending = vec![
        (cover_page_path, cover_page.to_xml_string()?.into_bytes()),
        (stylesheet_path.clone(), STYLESHEET.as_bytes().to_vec()),
    ];
    if let Some(data) = &cover.data {
        manifest.push(ManifestItem::new(cover.id.as_str(), cover.href.as_str(), cover.media_type.as_str()));
        pending.push((cover.archive_path.clone(), data.clone()));
    }

    let mut report = AssemblyReport {
        title: book.title.clone(),
        source_language: source_language.clone(),
        target_language: options.target_language.clone(),
        ..AssemblyReport::default()
    };

    let total = chapters.len();
    for (index, (chapter, id)) in chapters.iter().zip(chapter_ids).enumerate() {
        let data = epub.extract_binary_file(&chapter.archive_path).map_err(|e| match e {
            EpubError::Zip(zip::result::ZipError::FileNotFound) => {
                EpubError::MalformedPackage(format!("找不到章节文件: {}", chapter.archive_path))
            }
            other => other,
        })?;

        let content = if index < options.skip_sections {
            log::info!("章节 {}/{} {}: 跳过", index + 1, total, chapter.href);
            report.skipped.push(chapter.href.clone());
            data
        } else {
            log::info!("章节 {}/{} {}: 翻译中", index + 1, total, chapter.href);
            let transform_options = TransformOptions::new(
                book.title.as_str(),
                source_language.as_str(),
                options.target_language.as_str(),
                options.sentences_per_paragraph,
            )
            .with_stylesheet_href(relative_href(&chapter.archive_path, &stylesheet_path));

            match translate_chapter(chapter, &data, &transform_options, translator) {
                Ok(translated) => {
                    report.translated.push(chapter.href.clone());
                    translated
                }
                Err(err @ EpubError::Translation { .. }) if !options.strict => {
                    log::warn!("章节 {} 翻译失败，保留原文: {}", chapter.href, err);
                    report.failed.push(ChapterFailure {
                        href: chapter.href.clone(),
                        error: err.to_string(),
                    });
                    data
                }
                Err(err) => return Err(err),
            }
        };

        manifest.push(ManifestItem::new(id.as_str(), chapter.href.as_str(), XHTML_MEDIA_TYPE));
        spine.push(SpineItem::new(id.as_str()));
        pending.push((chapter.archive_path.clone(), content));
    }

    let mut spine_toc = None;
    for item in opf.manifest.iter().filter(|item| !item.is_chapter()) {
        let archive_path = resolve_href(&opf_dir, &item.href);
        if archive_path == opf_path || pending.iter().any(|(path, _)| *path == archive_path) {
            continue;
        }
        let data = match epub.extract_binary_file(&archive_path) {
            Ok(data) => data,
            Err(EpubError::Zip(zip::result::ZipError::FileNotFound)) => {
                log::warn!("清单中的资源不存在，已忽略: {}", archive_path);
                continue;
            }
            Err(e) => return Err(e),
        };

        let id = asset_ids.get(&item.id).cloned().unwrap_or_else(|| item.id.clone());
        if opf.get_ncx_item().is_some_and(|ncx| ncx.id == item.id) {
            spine_toc = Some(id.clone());
        }
        let mut carried = ManifestItem::new(id, item.href.as_str(), item.media_type.as_str());
        carried.properties = item.properties.clone();
        manifest.push(carried);
        pending.push((archive_path, data));
    }

    let package = PackageDocument {
        title: book.title.clone(),
        author: book.author.clone(),
        language: source_language,
        identifier: book_identifier(&book),
        cover_image_id: Some(cover.id.clone()),
        manifest,
        spine,
        spine_toc,
    };
    tree.insert(opf_path.as_str(), package.to_xml()?)?;
    for (path, data) in pending {
        tree.insert(path, data)?;
    }

    report.entries = tree.len();
    Ok((tree, report))
}

/// 读取、转换并序列化一个章节
fn translate_chapter<T>(chapter: &ChapterInfo, data: &[u8], options: &TransformOptions, translator: &T) -> Result<Vec<u8>>
where
    T: Translator + ?Sized,
{
    let xhtml = std::str::from_utf8(data)
        .map_err(|e| EpubError::InvalidEpub(format!("章节 {} 不是UTF-8编码: {}", chapter.href, e)))?;
    let document = Document::parse(xhtml)?;
    let output = transform(&document, options, translator)?;
    Ok(output.to_xml_string()?.into_bytes())
}

/// 确定封面图片：优先使用指定的文件，其次是原书OPF中的封面
fn plan_cover(
    epub: &mut Epub,
    opf: &Opf,
    opf_dir: &str,
    options: &AssembleOptions,
    asset_ids: &HashMap<String, String>,
    ids: &mut IdAllocator,
    taken_hrefs: &mut HashSet<String>,
) -> Result<CoverPlan> {
    if let Some(path) = &options.cover_image {
        return plan_cover_override(path, opf_dir, ids, taken_hrefs);
    }

    let CoverImage { href, media_type, data } =
        epub.cover_image_from_opf(opf, opf_dir)?.ok_or(EpubError::MissingCoverImage)?;
    let archive_path = resolve_href(opf_dir, &href);

    // 原书清单中已有该图片时直接引用，图片随其他资源一起复制
    if let Some(item) = opf.get_manifest_item_by_href(&href) {
        if let Some(id) = asset_ids.get(&item.id) {
            return Ok(CoverPlan {
                id: id.clone(),
                href,
                archive_path,
                data: None,
                media_type,
            });
        }
    }

    Ok(CoverPlan {
        id: ids.allocate(COVER_IMAGE_ID),
        href,
        archive_path,
        data: Some(data),
        media_type,
    })
}

fn plan_cover_override(
    path: &Path,
    opf_dir: &str,
    ids: &mut IdAllocator,
    taken_hrefs: &mut HashSet<String>,
) -> Result<CoverPlan> {
    let data = fs::read(path).map_err(|e| {
        EpubError::ConfigError(format!("无法读取封面图片 {}: {}", path.display(), e))
    })?;
    if data.is_empty() {
        return Err(EpubError::MissingCoverImage);
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| EpubError::ConfigError(format!("无效的封面图片路径: {}", path.display())))?;
    let media_type = image_media_type(file_name)
        .ok_or_else(|| EpubError::ConfigError(format!("不支持的封面图片格式: {}", file_name)))?;

    let href = unique_href(file_name, taken_hrefs);
    taken_hrefs.insert(href.clone());
    log::info!("使用指定的封面图片: {}", path.display());

    Ok(CoverPlan {
        id: ids.allocate(COVER_IMAGE_ID),
        archive_path: resolve_href(opf_dir, &href),
        href,
        data: Some(data),
        media_type: media_type.to_string(),
    })
}

fn book_identifier(book: &BookInfo) -> String {
    match &book.identifier {
        Some(identifier) if !identifier.trim().is_empty() => identifier.clone(),
        _ => format!("urn:bilingual-epub:{}", book.title),
    }
}

/// 把 `input` 转换为双语书籍并写出到 `output`
///
/// 输出文件先写入 `staging_dir`（缺省为输出目录）中的临时文件，成功后才出现在目标路径。
pub fn create_bilingual_epub<T>(
    input: &Path,
    output: &Path,
    staging_dir: Option<&Path>,
    options: &AssembleOptions,
    translator: &T,
) -> Result<AssemblyReport>
where
    T: Translator + ?Sized,
{
    let mut epub = Epub::new(input)?;
    let (tree, report) = assemble(&mut epub, options, translator)?;
    EpubWriter::persist(&tree, output, staging_dir)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::reader::EPUB_MIMETYPE;
    use crate::epub::reader::tests::{CONTAINER_XML, write_epub};
    use crate::epub::xml::{Element, Node};
    use std::cell::Cell;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>Le Livre</dc:title>
        <dc:creator opf:role="aut">Jean Auteur</dc:creator>
        <dc:language>fr</dc:language>
        <dc:identifier id="uid">urn:isbn:9780000000001</dc:identifier>
        <meta name="cover" content="cover-img"/>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
        <item id="style" href="styles/book.css" media-type="text/css"/>
        <item id="c0" href="text/ch0.xhtml" media-type="application/xhtml+xml"/>
        <item id="c1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
        <item id="c2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="c0"/>
        <itemref idref="c1"/>
        <itemref idref="c2"/>
    </spine>
</package>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap/></ncx>"#;

    fn chapter(heading: &str, paragraph: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{heading}</title></head>
<body>
<h2>{heading}</h2>
<p>{paragraph}</p>
</body>
</html>"#
        )
    }

    fn build_book(path: &Path, opf: &str) {
        let ch0 = chapter("Préface", "Bonjour. Au revoir.");
        let ch1 = chapter("Un", "Premier. Deuxième.");
        let ch2 = chapter("Deux", "Troisième.");
        write_epub(
            path,
            &[
                ("mimetype", EPUB_MIMETYPE.as_bytes()),
                ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
                ("OEBPS/content.opf", opf.as_bytes()),
                ("OEBPS/toc.ncx", NCX.as_bytes()),
                ("OEBPS/images/cover.jpg", &[0xFF, 0xD8, 0xFF, 0xE0][..]),
                ("OEBPS/styles/book.css", "p { margin: 0; }".as_bytes()),
                ("OEBPS/text/ch0.xhtml", ch0.as_bytes()),
                ("OEBPS/text/ch1.xhtml", ch1.as_bytes()),
                ("OEBPS/text/ch2.xhtml", ch2.as_bytes()),
            ],
        )
        .unwrap();
    }

    fn options(skip: usize, sentences: usize) -> AssembleOptions {
        AssembleOptions {
            target_language: "en".to_string(),
            source_language: None,
            skip_sections: skip,
            sentences_per_paragraph: NonZeroUsize::new(sentences).unwrap(),
            cover_image: None,
            strict: false,
        }
    }

    fn upper(text: &str, _: &str, _: &str) -> Result<String> {
        Ok(text.to_uppercase())
    }

    fn open_book(dir: &tempfile::TempDir) -> Epub {
        let path = dir.path().join("book.epub");
        build_book(&path, OPF);
        Epub::new(&path).unwrap()
    }

    fn paragraphs(xhtml: &[u8]) -> Vec<(String, String)> {
        let document = Document::parse(std::str::from_utf8(xhtml).unwrap()).unwrap();
        let container = templates::chapter_container(&document).unwrap();
        container
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) if element.local_name() == "p" => Some(element),
                _ => None,
            })
            .map(|p: &Element| (p.attribute("class").unwrap_or_default().to_string(), p.text_content()))
            .collect()
    }

    #[test]
    fn test_end_to_end_three_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = open_book(&dir);
        let source_ch0 = epub.extract_binary_file("OEBPS/text/ch0.xhtml").unwrap();

        let (tree, report) = assemble(&mut epub, &options(1, 1), &upper).unwrap();

        assert_eq!(report.skipped, vec!["text/ch0.xhtml"]);
        assert_eq!(report.translated, vec!["text/ch1.xhtml", "text/ch2.xhtml"]);
        assert!(report.is_complete());
        assert_eq!(report.source_language, "fr");

        assert_eq!(tree.get("OEBPS/text/ch0.xhtml").unwrap(), source_ch0.as_slice());
        assert_eq!(
            paragraphs(tree.get("OEBPS/text/ch1.xhtml").unwrap()),
            vec![
                ("src".to_string(), "Premier.".to_string()),
                ("trans".to_string(), "PREMIER.".to_string()),
                ("src".to_string(), "Deuxième.".to_string()),
                ("trans".to_string(), "DEUXIÈME.".to_string()),
            ]
        );
        assert_eq!(
            paragraphs(tree.get("OEBPS/text/ch2.xhtml").unwrap()),
            vec![
                ("src".to_string(), "Troisième.".to_string()),
                ("trans".to_string(), "TROISIÈME.".to_string()),
            ]
        );

        let ch1 = std::str::from_utf8(tree.get("OEBPS/text/ch1.xhtml").unwrap()).unwrap();
        assert!(ch1.starts_with("<?xml"));
        assert!(ch1.contains(r#"href="../view.css""#));
        assert!(ch1.contains("<title>Le Livre</title>"));
    }

    #[test]
    fn test_manifest_and_spine_follow_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = open_book(&dir);
        let (tree, _) = assemble(&mut epub, &options(1, 2), &upper).unwrap();

        let opf = Opf::parse_xml(std::str::from_utf8(tree.get("OEBPS/content.opf").unwrap()).unwrap()).unwrap();
        let spine: Vec<&str> = opf.spine.iter().map(|item| item.idref.as_str()).collect();
        assert_eq!(spine, vec!["cover", "ch0", "ch1", "ch2"]);
        assert!(opf.spine.iter().all(|item| item.linear));

        for href in ["text/ch0.xhtml", "text/ch1.xhtml", "text/ch2.xhtml"] {
            let matching = opf.manifest.iter().filter(|item| item.href == href).count();
            assert_eq!(matching, 1, "{}", href);
        }
        for item in &opf.spine {
            assert!(opf.get_manifest_item(&item.idref).is_some());
        }

        assert_eq!(opf.spine_toc.as_deref(), Some("ncx"));
        assert_eq!(opf.get_cover_path().as_deref(), Some("images/cover.jpg"));
        assert_eq!(opf.metadata.title().as_deref(), Some("Le Livre"));
        assert_eq!(opf.metadata.author().as_deref(), Some("Jean Auteur"));

        assert!(tree.contains("OEBPS/toc.ncx"));
        assert!(tree.contains("OEBPS/styles/book.css"));
        assert!(tree.contains("OEBPS/view.css"));
        assert!(tree.contains("OEBPS/cover.xhtml"));
        assert!(tree.contains("META-INF/container.xml"));
        assert_eq!(tree.paths().next(), Some("mimetype"));
    }

    #[test]
    fn test_skip_count_beyond_chapters_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = open_book(&dir);
        let calls = Cell::new(0);
        let counting = |text: &str, _: &str, _: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            Ok(text.to_string())
        };

        let (tree, report) = assemble(&mut epub, &options(10, 2), &counting).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(report.skipped.len(), 3);
        for path in ["OEBPS/text/ch0.xhtml", "OEBPS/text/ch1.xhtml", "OEBPS/text/ch2.xhtml"] {
            assert_eq!(tree.get(path).unwrap(), epub.extract_binary_file(path).unwrap().as_slice());
        }
    }

    #[test]
    fn test_translation_failure_keeps_chapter_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = open_book(&dir);
        let flaky = |text: &str, _: &str, _: &str| -> Result<String> {
            if text.starts_with("Trois") {
                Err(EpubError::translation(text, 4, "timeout"))
            } else {
                Ok(text.to_uppercase())
            }
        };

        let (tree, report) = assemble(&mut epub, &options(1, 1), &flaky).unwrap();
        assert_eq!(report.translated, vec!["text/ch1.xhtml"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].href, "text/ch2.xhtml");
        assert!(!report.is_complete());
        assert_eq!(
            tree.get("OEBPS/text/ch2.xhtml").unwrap(),
            epub.extract_binary_file("OEBPS/text/ch2.xhtml").unwrap().as_slice()
        );
    }

    #[test]
    fn test_strict_mode_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = open_book(&dir);
        let failing = |text: &str, _: &str, _: &str| -> Result<String> {
            Err(EpubError::translation(text, 1, "offline"))
        };
        let mut strict = options(1, 1);
        strict.strict = true;

        let result = assemble(&mut epub, &strict, &failing);
        assert!(matches!(result, Err(EpubError::Translation { .. })));
    }

    #[test]
    fn test_missing_cover_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocover.epub");
        build_book(&path, &OPF.replace(r#"<meta name="cover" content="cover-img"/>"#, ""));
        let mut epub = Epub::new(&path).unwrap();

        let result = assemble(&mut epub, &options(1, 1), &upper);
        assert!(matches!(result, Err(EpubError::MissingCoverImage)));
    }

    #[test]
    fn test_cover_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocover.epub");
        build_book(&path, &OPF.replace(r#"<meta name="cover" content="cover-img"/>"#, ""));
        let cover_path = dir.path().join("front.png");
        fs::write(&cover_path, [0x89, b'P', b'N', b'G']).unwrap();

        let mut epub = Epub::new(&path).unwrap();
        let mut with_cover = options(3, 1);
        with_cover.cover_image = Some(cover_path);

        let (tree, _) = assemble(&mut epub, &with_cover, &upper).unwrap();
        assert_eq!(tree.get("OEBPS/front.png").unwrap(), &[0x89, b'P', b'N', b'G'][..]);

        let opf = Opf::parse_xml(std::str::from_utf8(tree.get("OEBPS/content.opf").unwrap()).unwrap()).unwrap();
        let cover = opf.get_manifest_item(COVER_IMAGE_ID).unwrap();
        assert_eq!(cover.href, "front.png");
        assert_eq!(cover.media_type, "image/png");
        assert_eq!(opf.metadata.cover().as_deref(), Some(COVER_IMAGE_ID));

        let page = std::str::from_utf8(tree.get("OEBPS/cover.xhtml").unwrap()).unwrap();
        assert!(page.contains(r#"src="front.png""#));
    }

    #[test]
    fn test_missing_chapter_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        write_epub(
            &path,
            &[
                ("mimetype", EPUB_MIMETYPE.as_bytes()),
                ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
                ("OEBPS/content.opf", OPF.as_bytes()),
                ("OEBPS/images/cover.jpg", &[0xFF, 0xD8][..]),
            ],
        )
        .unwrap();
        let mut epub = Epub::new(&path).unwrap();

        let result = assemble(&mut epub, &options(0, 1), &upper);
        assert!(matches!(result, Err(EpubError::MalformedPackage(_))));
    }

    #[test]
    fn test_create_bilingual_epub_writes_readable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.epub");
        build_book(&input, OPF);
        let output = dir.path().join("out").join("book_bilingual.epub");

        let report = create_bilingual_epub(&input, &output, None, &options(1, 2), &upper).unwrap();
        assert_eq!(report.translated.len(), 2);

        let mut written = Epub::new(&output).unwrap();
        assert_eq!(written.list_files().unwrap()[0], "mimetype");
        assert_eq!(written.list_files().unwrap().len(), report.entries);
        assert_eq!(written.book_info().unwrap().title, "Le Livre");
        assert_eq!(written.chapters().unwrap().len(), 4);
    }

    #[test]
    fn test_id_helpers() {
        assert_eq!(chapter_id("text/ch1.xhtml"), "ch1");
        assert_eq!(chapter_id("part.one.html#x"), "part.one");
        assert_eq!(xml_name("001"), "item-001");
        assert_eq!(xml_name("a b/c"), "a_b_c");

        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate("cover"), "cover");
        assert_eq!(ids.allocate("cover"), "cover-1");
        assert_eq!(ids.allocate(UNIQUE_IDENTIFIER_ID), "BookId-1");

        let taken: HashSet<String> = ["view.css".to_string()].into_iter().collect();
        assert_eq!(unique_href("view.css", &taken), "view-1.css");
        assert_eq!(unique_href("cover.xhtml", &taken), "cover.xhtml");
    }

    #[test]
    fn test_relative_href() {
        assert_eq!(relative_href("OEBPS/text/ch1.xhtml", "OEBPS/view.css"), "../view.css");
        assert_eq!(relative_href("OEBPS/cover.xhtml", "OEBPS/images/c.jpg"), "images/c.jpg");
        assert_eq!(relative_href("ch1.xhtml", "view.css"), "view.css");
        assert_eq!(relative_href("a/b/c.xhtml", "a/d/e.css"), "../d/e.css");
    }
}
