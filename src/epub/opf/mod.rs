//! OPF（Open Packaging Format）文件解析与生成模块
//!
//! 此模块提供EPUB文件中OPF包文件的解析功能，包括元数据、清单、脊柱等信息的提取，
//! 以及输出书籍OPF文件的结构化生成。

mod metadata;
mod manifest;
mod package;
mod spine;
mod parser;

// 重新导出公共类型以保持API兼容性
pub use metadata::{
    Creator,
    Identifier,
    Metadata,
    MetadataValue,
    MetaValue
};
pub use manifest::{ManifestItem, NCX_MEDIA_TYPE, XHTML_MEDIA_TYPE, image_media_type};
pub use package::{PackageDocument, UNIQUE_IDENTIFIER_ID};
pub use spine::SpineItem;
pub use parser::Opf;
