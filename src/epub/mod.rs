pub mod error;
pub mod xml;
pub mod container;
pub mod reader;
pub mod writer;
pub mod opf;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出EPUB读取器和数据结构
pub use reader::{
    Epub,
    BookInfo,
    ChapterInfo,
    CoverImage,
    EPUB_MIMETYPE,
};

// 重新导出写出相关
pub use writer::{EpubWriter, WorkingTree};

// 重新导出XML树
pub use xml::{Document, Element, Node};

// 重新导出OPF相关
pub use opf::{
    Opf,
    Metadata,
    Creator,
    Identifier,
    ManifestItem,
    SpineItem,
    PackageDocument,
};
