//! EPUB写出模块
//!
//! 输出书籍先在内存中组装为有序的工作树，再一次性写入zip压缩包。
//! mimetype总是第一个条目且不压缩；压缩包先写到临时文件，成功后才改名为目标路径。

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::epub::error::{EpubError, Result};
use crate::epub::reader::EPUB_MIMETYPE;

/// mimetype条目名
pub const MIMETYPE_PATH: &str = "mimetype";

/// 按加入顺序保存的输出文件集合，key为压缩包内的相对路径
#[derive(Debug, Default, Clone)]
pub struct WorkingTree {
    entries: Vec<(String, Vec<u8>)>,
    paths: HashSet<String>,
}

impl WorkingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已包含mimetype条目的工作树
    pub fn with_mimetype() -> Self {
        let mut tree = Self::new();
        tree.entries
            .push((MIMETYPE_PATH.to_string(), EPUB_MIMETYPE.as_bytes().to_vec()));
        tree.paths.insert(MIMETYPE_PATH.to_string());
        tree
    }

    /// 加入一个文件，同一路径不允许重复写入
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = path.into();
        if !self.paths.insert(path.clone()) {
            return Err(EpubError::Serialization(format!("输出包中存在重复的文件: {}", path)));
        }
        log::debug!("加入输出文件: {}", path);
        self.entries.push((path, data.into()));
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, data)| data.as_slice())
    }

    /// 按加入顺序列出所有路径
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// EPUB压缩包写出器
pub struct EpubWriter;

impl EpubWriter {
    /// 把工作树写入任意可定位的输出流
    pub fn write_archive<W: Write + Seek>(tree: &WorkingTree, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // mimetype必须是第一个条目且不压缩
        let mimetype = tree.get(MIMETYPE_PATH).unwrap_or(EPUB_MIMETYPE.as_bytes());
        zip.start_file(MIMETYPE_PATH, stored)?;
        zip.write_all(mimetype)?;

        for (path, data) in &tree.entries {
            if path == MIMETYPE_PATH {
                continue;
            }
            zip.start_file(path.as_str(), deflated)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?)
    }

    /// 写出到目标路径
    ///
    /// 压缩包先写入 `staging_dir`（缺省为目标文件所在目录）中的临时文件，
    /// 全部成功后再改名到目标路径；任何失败都不会留下损坏的输出文件。
    pub fn persist(tree: &WorkingTree, output: &Path, staging_dir: Option<&Path>) -> Result<()> {
        let archive_error = |message: String| EpubError::ArchiveWrite {
            path: output.display().to_string(),
            message,
        };

        let output_dir = output_directory(output);
        let staging_dir = staging_dir.map(Path::to_path_buf).unwrap_or_else(|| output_dir.clone());
        std::fs::create_dir_all(&output_dir).map_err(|e| archive_error(e.to_string()))?;
        std::fs::create_dir_all(&staging_dir).map_err(|e| archive_error(e.to_string()))?;

        let mut staged = staging_file(&staging_dir).map_err(|e| archive_error(format!("无法创建临时文件: {}", e)))?;

        Self::write_archive(tree, staged.as_file_mut())
            .map_err(|e| archive_error(e.to_string()))?;
        staged
            .as_file_mut()
            .sync_all()
            .map_err(|e| archive_error(e.to_string()))?;

        if let Err(err) = staged.persist(output) {
            // 临时目录与目标不在同一文件系统时无法改名，先复制到目标目录再改名
            log::warn!("无法直接移动临时文件({})，改为复制", err.error);
            let staged = err.file;
            copy_into_place(staged.path(), output).map_err(|e| archive_error(e.to_string()))?;
        }

        log::info!("已写出 {} ({} 个文件)", output.display(), tree.len());
        Ok(())
    }
}

fn output_directory(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".bilingual-")
        .suffix(".epub.part")
        .tempfile_in(dir)
}

/// 把 `source` 复制到目标目录下的临时文件，再在同一文件系统内改名为 `output`
///
/// 复制中途失败时只会留下被自动清理的临时文件，目标路径保持不变。
fn copy_into_place(source: &Path, output: &Path) -> io::Result<()> {
    let mut local = staging_file(&output_directory(output))?;
    let mut reader = File::open(source)?;
    io::copy(&mut reader, local.as_file_mut())?;
    local.as_file_mut().sync_all()?;
    local.persist(output).map_err(|e| e.error)?;
    Ok(())
}
