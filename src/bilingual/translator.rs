//! 翻译服务模块
//!
//! 翻译服务以 [`Translator`] trait 的形式显式传入转换流程，不使用全局客户端。
//! 提供基于HTTP的 [`GoogleTranslator`]，以及带指数退避重试的 [`RetryingTranslator`] 包装。

use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::config::TranslationSettings;
use crate::epub::error::{EpubError, Result};

/// 翻译服务接口，每个段落块调用一次
pub trait Translator {
    /// 把 `text` 从 `source_lang` 翻译为 `target_lang`
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;
}

/// 任意同签名的闭包都可以作为翻译服务，便于测试时注入桩实现
impl<F> Translator for F
where
    F: Fn(&str, &str, &str) -> Result<String>,
{
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self(text, source_lang, target_lang)
    }
}

/// 调用Google翻译网页接口（`client=gtx`）的翻译服务
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(settings: &TranslationSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| EpubError::ConfigError(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| EpubError::translation(text, 1, e.to_string()))?;

        let body: Value = response
            .json()
            .map_err(|e| EpubError::translation(text, 1, format!("响应不是有效的JSON: {}", e)))?;

        parse_google_response(&body)
            .ok_or_else(|| EpubError::translation(text, 1, "无法从响应中提取译文"))
    }
}

/// 拼接响应第一个数组中每个片段的首个元素
///
/// 响应形如 `[[["译文1","原文1",...],["译文2","原文2",...]], null, "fr", ...]`。
fn parse_google_response(body: &Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() && !segments.is_empty() {
        return None;
    }
    Some(translated)
}

/// 失败后按指数退避重试的翻译服务包装
#[derive(Debug, Clone)]
pub struct RetryingTranslator<T> {
    inner: T,
    max_retries: u32,
    backoff: Duration,
}

impl<T: Translator> RetryingTranslator<T> {
    pub fn new(inner: T, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }

    /// 按配置中的重试次数与退避时间包装
    pub fn from_settings(inner: T, settings: &TranslationSettings) -> Self {
        Self::new(inner, settings.max_retries, settings.retry_backoff())
    }
}

impl<T: Translator> Translator for RetryingTranslator<T> {
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.translate(text, source_lang, target_lang) {
                Ok(translated) => return Ok(translated),
                Err(err) if attempt < self.max_retries => {
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    log::warn!(
                        "翻译失败，{}ms后进行第{}/{}次重试: {}",
                        delay.as_millis(),
                        attempt,
                        self.max_retries,
                        err
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    let message = match err {
                        EpubError::Translation { message, .. } => message,
                        other => other.to_string(),
                    };
                    return Err(EpubError::translation(text, attempt + 1, message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_closure_is_translator() {
        let upper = |text: &str, _: &str, _: &str| -> Result<String> { Ok(text.to_uppercase()) };
        assert_eq!(upper.translate("hello", "en", "fr").unwrap(), "HELLO");
    }

    #[test]
    fn test_retry_until_success() {
        let calls = Cell::new(0);
        let flaky = |text: &str, _: &str, _: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(EpubError::translation(text, 1, "timeout"))
            } else {
                Ok(format!("[{}]", text))
            }
        };

        let translator = RetryingTranslator::new(flaky, 3, Duration::ZERO);
        assert_eq!(translator.translate("a", "en", "de").unwrap(), "[a]");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let calls = Cell::new(0);
        let failing = |text: &str, _: &str, _: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            Err(EpubError::translation(text, 1, "service unavailable"))
        };

        let translator = RetryingTranslator::new(failing, 2, Duration::ZERO);
        match translator.translate("chunk", "en", "de") {
            Err(EpubError::Translation { attempts, message, chunk }) => {
                assert_eq!(attempts, 3);
                assert_eq!(message, "service unavailable");
                assert_eq!(chunk, "chunk");
            }
            other => panic!("期望Translation错误, 得到 {:?}", other),
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_parse_google_response() {
        let body: Value = serde_json::from_str(
            r#"[[["Bonjour. ","Hello. ",null,null,10],["Le monde.","The world.",null,null,10]],null,"en"]"#,
        )
        .unwrap();
        assert_eq!(parse_google_response(&body), Some("Bonjour. Le monde.".to_string()));

        let broken: Value = serde_json::from_str(r#"{"error": "bad"}"#).unwrap();
        assert_eq!(parse_google_response(&broken), None);
    }
}
