use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// Epub读取、转换与打包过程中的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("文件不是有效的EPUB格式: {0}")]
    InvalidEpub(String),

    #[error("缺少mimetype文件")]
    MissingMimetype,

    #[error("无效的mimetype: {expected}, 找到: {found}")]
    InvalidMimetype { expected: String, found: String },

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("container.xml解析错误: {0}")]
    ContainerParseError(String),

    #[error("OPF文件解析错误: {0}")]
    OpfParseError(String),

    /// 缺少container/OPF或必需的元数据字段
    #[error("EPUB包结构不完整: {0}")]
    MalformedPackage(String),

    #[error("找不到封面图片，请使用 --cover-image 指定")]
    MissingCoverImage,

    /// 某个文本块在重试之后仍然翻译失败
    #[error("翻译失败（已尝试{attempts}次）: {message}; 文本: {chunk}")]
    Translation {
        chunk: String,
        attempts: u32,
        message: String,
    },

    #[error("XML序列化错误: {0}")]
    Serialization(String),

    #[error("写入输出文件 {path} 失败: {message}")]
    ArchiveWrite { path: String, message: String },

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl From<quick_xml::events::attributes::AttrError> for EpubError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        EpubError::XmlError(quick_xml::Error::InvalidAttr(err))
    }
}

impl EpubError {
    /// 截断过长的文本，避免错误信息里塞满整段原文
    pub(crate) fn translation(chunk: &str, attempts: u32, message: impl Into<String>) -> Self {
        let chunk: String = if chunk.chars().count() > 60 {
            let head: String = chunk.chars().take(60).collect();
            format!("{}…", head)
        } else {
            chunk.to_string()
        };
        EpubError::Translation {
            chunk,
            attempts,
            message: message.into(),
        }
    }
}
