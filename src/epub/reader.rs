use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use crate::epub::container::Container;
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{ManifestItem, Opf, image_media_type};

/// EPUB的mimetype内容
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 书籍基本信息
#[derive(Debug, Clone, PartialEq)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    /// 语言代码（dc:language）
    pub language: String,
    pub identifier: Option<String>,
}

/// 章节信息
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterInfo {
    /// 清单项ID
    pub id: String,
    /// 相对于OPF文件的路径
    pub href: String,
    /// 在压缩包中的完整路径
    pub archive_path: String,
}

/// 封面图片
#[derive(Debug, Clone)]
pub struct CoverImage {
    /// 相对于OPF文件的路径
    pub href: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// 表示一个EPUB文件
pub struct Epub {
    archive: ZipArchive<File>,
}

impl Epub {
    /// 从文件路径创建Epub实例
    ///
    /// # 参数
    /// * `path` - epub文件的路径
    ///
    /// # 返回值
    /// * `Result<Epub, EpubError>` - 成功返回Epub实例，失败返回错误
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Epub> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;

        let mut epub = Epub { archive };
        epub.validate()?;

        Ok(epub)
    }

    /// `new` 的别名
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Epub> {
        Self::new(path)
    }

    /// 验证EPUB文件的合法性：mimetype文件存在且内容为"application/epub+zip"
    fn validate(&mut self) -> Result<()> {
        let mut file = self
            .archive
            .by_name("mimetype")
            .map_err(|_| EpubError::MissingMimetype)?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        // 去除可能的换行符和空白字符
        let content = content.trim();
        if content != EPUB_MIMETYPE {
            return Err(EpubError::InvalidMimetype {
                expected: EPUB_MIMETYPE.to_string(),
                found: content.to_string(),
            });
        }

        log::debug!("EPUB验证成功: mimetype文件正确");
        Ok(())
    }

    /// 列出EPUB文件中的所有条目
    pub fn list_files(&mut self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for i in 0..self.archive.len() {
            let file = self.archive.by_index(i)?;
            files.push(file.name().to_string());
        }

        Ok(files)
    }

    /// 检查压缩包中是否存在指定条目
    pub fn has_file(&self, filename: &str) -> bool {
        self.archive.index_for_name(filename).is_some()
    }

    /// 提取指定文件的内容
    pub fn extract_file(&mut self, filename: &str) -> Result<String> {
        let mut file = self.archive.by_name(filename)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(content)
    }

    /// 提取指定文件的二进制内容
    pub fn extract_binary_file(&mut self, filename: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(filename)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// 解析container.xml文件
    pub fn parse_container(&mut self) -> Result<Container> {
        let container_content = self.extract_file("META-INF/container.xml").map_err(|e| match e {
            EpubError::Zip(zip::result::ZipError::FileNotFound) => {
                EpubError::MalformedPackage("缺少META-INF/container.xml".to_string())
            }
            other => other,
        })?;
        Container::parse_xml(&container_content)
    }

    /// 获取主要的OPF文件路径
    pub fn get_opf_path(&mut self) -> Result<String> {
        let container = self.parse_container()?;

        container.get_opf_path().ok_or_else(|| {
            EpubError::MalformedPackage("container.xml中没有找到有效的rootfile".to_string())
        })
    }

    /// 解析OPF文件
    pub fn parse_opf(&mut self) -> Result<Opf> {
        let opf_path = self.get_opf_path()?;
        let opf_content = self.extract_file(&opf_path).map_err(|e| match e {
            EpubError::Zip(zip::result::ZipError::FileNotFound) => {
                EpubError::MalformedPackage(format!("找不到OPF文件: {}", opf_path))
            }
            other => other,
        })?;

        Opf::parse_xml(&opf_content).map_err(|e| match e {
            EpubError::XmlError(xml_err) => EpubError::OpfParseError(format!("XML解析错误: {}", xml_err)),
            other => other,
        })
    }

    /// 获取OPF文件所在的目录
    pub fn get_opf_directory(&mut self) -> Result<String> {
        let opf_path = self.get_opf_path()?;
        Ok(parent_directory(&opf_path))
    }

    /// 获取书籍的基本信息，标题、作者与语言缺一不可
    pub fn book_info(&mut self) -> Result<BookInfo> {
        let opf = self.parse_opf()?;
        book_info_from_opf(&opf)
    }

    /// 按清单顺序获取所有章节
    pub fn chapters(&mut self) -> Result<Vec<ChapterInfo>> {
        let opf = self.parse_opf()?;
        let opf_dir = self.get_opf_directory()?;
        Ok(chapters_from_opf(&opf, &opf_dir))
    }

    /// 读取OPF元数据中引用的封面图片
    ///
    /// 依次检查manifest中具有cover-image属性的项目和`<meta name="cover">`。
    /// 没有封面时返回None。
    pub fn cover_image(&mut self) -> Result<Option<CoverImage>> {
        let opf = self.parse_opf()?;
        let opf_dir = self.get_opf_directory()?;
        self.cover_image_from_opf(&opf, &opf_dir)
    }

    pub(crate) fn cover_image_from_opf(&mut self, opf: &Opf, opf_dir: &str) -> Result<Option<CoverImage>> {
        let Some(href) = opf.get_cover_path() else {
            return Ok(None);
        };

        let full_path = resolve_href(opf_dir, &href);
        let data = match self.extract_binary_file(&full_path) {
            Ok(data) if !data.is_empty() => data,
            Ok(_) | Err(EpubError::Zip(zip::result::ZipError::FileNotFound)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let media_type = opf
            .get_manifest_item_by_href(&href)
            .filter(|item| item.is_image())
            .map(|item| item.media_type.clone())
            .or_else(|| image_media_type(&href).map(str::to_string))
            .unwrap_or_else(|| "image/jpeg".to_string());

        Ok(Some(CoverImage {
            href,
            media_type,
            data,
        }))
    }
}

/// 从OPF中提取书籍基本信息
pub(crate) fn book_info_from_opf(opf: &Opf) -> Result<BookInfo> {
    let title = opf
        .metadata
        .title()
        .ok_or_else(|| EpubError::MalformedPackage("元数据缺少dc:title".to_string()))?;
    let author = opf
        .metadata
        .author()
        .ok_or_else(|| EpubError::MalformedPackage("元数据缺少dc:creator".to_string()))?;
    let language = opf
        .metadata
        .language()
        .ok_or_else(|| EpubError::MalformedPackage("元数据缺少dc:language".to_string()))?;
    let identifier = opf.metadata.identifiers().into_iter().next().map(|id| id.value);

    Ok(BookInfo {
        title,
        author,
        language,
        identifier,
    })
}

pub(crate) fn chapters_from_opf(opf: &Opf, opf_dir: &str) -> Vec<ChapterInfo> {
    opf.chapter_items()
        .into_iter()
        .map(|item: &ManifestItem| ChapterInfo {
            id: item.id.clone(),
            href: item.href.clone(),
            archive_path: resolve_href(opf_dir, &item.href),
        })
        .collect()
}

/// 取路径的父目录，根目录下的文件返回空字符串
pub fn parent_directory(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// 把相对于OPF目录的href解析为压缩包内的完整路径
///
/// 去掉片段标识并折叠 `.` 与 `..` 路径段。
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
