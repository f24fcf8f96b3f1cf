//! 转换配置模块
//!
//! 提供双语转换的配置管理功能，支持从YAML文件加载配置，命令行参数可覆盖文件中的值。

use crate::epub::error::{EpubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "bilingual.yaml";

/// 默认的翻译服务地址
pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// 翻译服务相关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// 翻译服务地址
    pub endpoint: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 单个文本块失败后的最大重试次数
    pub max_retries: u32,
    /// 首次重试前的等待时间（毫秒），之后每次翻倍
    pub retry_backoff_ms: u64,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl TranslationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// 双语转换配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilingualConfig {
    /// 译文语言
    pub target_language: String,
    /// 原文语言，缺省时使用书籍元数据中的dc:language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    /// 不翻译的前N个章节
    pub skip_sections: usize,
    /// 每个段落块包含的句子数
    pub sentences_per_paragraph: NonZeroUsize,
    /// 翻译失败时中止整个转换，而不是原样保留该章节
    pub strict: bool,
    pub translation: TranslationSettings,
}

impl Default for BilingualConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl BilingualConfig {
    /// 从指定的配置文件中加载配置，文件中缺少的字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件 {}: {}", path.as_ref().display(), e)))?;

        Self::from_yaml(&content)
    }

    /// 从YAML文本解析配置
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yml::from_str(content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 生成默认配置文件
    ///
    /// # 示例
    ///
    /// ```rust,no_run
    /// use bilingual_epub::BilingualConfig;
    /// BilingualConfig::generate_default_config("bilingual.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default_config())
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        // 在YAML内容前添加注释说明
        let content_with_header = format!(
            "# 双语EPUB转换配置文件\n# 命令行参数会覆盖这里的同名设置\n# source_language 缺省时使用书籍自身的 dc:language\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 获取默认配置
    pub fn default_config() -> Self {
        Self {
            target_language: "en".to_string(),
            source_language: None,
            skip_sections: 1,
            sentences_per_paragraph: NonZeroUsize::new(2).unwrap_or(NonZeroUsize::MIN),
            strict: false,
            translation: TranslationSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = BilingualConfig::from_yaml("target_language: de\ntranslation:\n  max_retries: 5\n").unwrap();

        assert_eq!(config.target_language, "de");
        assert_eq!(config.skip_sections, 1);
        assert_eq!(config.sentences_per_paragraph.get(), 2);
        assert_eq!(config.translation.max_retries, 5);
        assert_eq!(config.translation.endpoint, DEFAULT_TRANSLATE_ENDPOINT);
    }

    #[test]
    fn test_zero_sentences_rejected() {
        let result = BilingualConfig::from_yaml("sentences_per_paragraph: 0\n");
        assert!(matches!(result, Err(EpubError::ConfigError(_))));
    }

    #[test]
    fn test_generate_and_reload_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);

        BilingualConfig::generate_default_config(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# 双语EPUB转换配置文件"));

        let config = BilingualConfig::from_file(&path).unwrap();
        assert_eq!(config, BilingualConfig::default_config());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = BilingualConfig::from_file("/nonexistent/bilingual.yaml");
        assert!(matches!(result, Err(EpubError::ConfigError(_))));
    }
}
