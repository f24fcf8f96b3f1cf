pub mod epub;
pub mod bilingual;
pub mod config;

// === 核心API重新导出 ===

/// EPUB文件读取器
pub use epub::Epub;

/// 错误处理
pub use epub::{EpubError, Result};

/// 配置
pub use config::{BilingualConfig, TranslationSettings};

// === 双语转换 ===

/// 段落切分与章节转换
pub use bilingual::{segment, transform, TransformOptions};

/// 翻译服务
pub use bilingual::{GoogleTranslator, RetryingTranslator, Translator};

/// 整书打包
pub use bilingual::{assemble, create_bilingual_epub, AssembleOptions, AssemblyReport, ChapterFailure};

// === 数据结构 ===

/// 书籍基本信息
pub use epub::{BookInfo, ChapterInfo, CoverImage};

// === 底层组件（高级用法） ===

/// 容器组件
pub use epub::{Container, RootFile};

/// OPF组件
pub use epub::{
    Opf,
    Metadata,
    Creator,
    Identifier,
    ManifestItem,
    SpineItem,
    PackageDocument,
};

/// 输出组件
pub use epub::{EpubWriter, WorkingTree};

// === 库信息 ===

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "把EPUB电子书转换为原文与译文逐段对照的双语版本";

// === 便捷函数 ===

/// 快速打开EPUB文件
///
/// 这是 `Epub::from_path` 的便捷包装函数。
///
/// # 示例
///
/// ```rust,no_run
/// let mut epub = bilingual_epub::open("book.epub")?;
/// let info = epub.book_info()?;
/// println!("书名: {}", info.title);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Epub> {
    Epub::from_path(path)
}
