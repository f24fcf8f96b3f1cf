//! 双语转换
//!
//! 段落切分、翻译服务、章节转换与整书打包。

pub mod segmenter;
pub mod translator;
pub mod templates;
pub mod transformer;
pub mod assembler;

pub use segmenter::{SENTENCE_DELIMITER, segment};
pub use translator::{GoogleTranslator, RetryingTranslator, Translator};
pub use transformer::{BodyNode, TransformOptions, transform, transform_xhtml};
pub use assembler::{
    AssembleOptions,
    AssemblyReport,
    ChapterFailure,
    assemble,
    create_bilingual_epub,
};
