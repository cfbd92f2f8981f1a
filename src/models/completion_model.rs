//! 补全请求/响应模型
//!
//! `/complete` 与 `/complete_stream` 共用的数据结构。

use crate::backends::GenerateOptions;
use serde::{Deserialize, Serialize};

/// 默认停止序列
pub const DEFAULT_STOPS: [&str; 5] = ["\n\n```", "\n\n##", "\n\n# ", "\n\n\"\"\"", "\n\n'''"];

pub const DEFAULT_LANGUAGE: &str = "python";
pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const MAX_TOKENS_LIMIT: u32 = 512;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// 补全请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// 光标前的代码
    #[serde(default)]
    pub prefix: String,
    /// 光标后的代码
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// 停止序列
    ///
    /// `None`（缺省或 `null`）使用默认集合，`Some(vec![])` 表示不使用停止序列
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    /// 在 `/complete` 上改用 NDJSON 流式返回
    #[serde(default)]
    pub stream: bool,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            language: default_language(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stop: None,
            stream: false,
        }
    }
}

impl CompletionRequest {
    /// 校验数值范围，在调用后端之前执行
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens < 1 || self.max_tokens > MAX_TOKENS_LIMIT {
            return Err(format!(
                "max_tokens must be between 1 and {}, got {}",
                MAX_TOKENS_LIMIT, self.max_tokens
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            ));
        }
        Ok(())
    }

    /// 规范化后的语言名（去空白、小写）
    pub fn normalized_language(&self) -> String {
        self.language.trim().to_lowercase()
    }

    /// 实际生效的停止序列
    pub fn effective_stops(&self) -> Vec<String> {
        match &self.stop {
            None => DEFAULT_STOPS.iter().map(|s| s.to_string()).collect(),
            Some(list) => sanitize_stops(list),
        }
    }

    /// 转换为后端生成参数
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: self.effective_stops(),
        }
    }
}

/// 去空白、去空串、按首次出现去重
pub fn sanitize_stops(stops: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(stops.len());
    for stop in stops {
        let trimmed = stop.trim();
        if !trimmed.is_empty() && !out.iter().any(|s| s == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// 补全响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub request_id: String,
    pub completion: String,
}

/// 生成请求 ID：UUIDv4 的前 8 个十六进制字符
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_body() {
        let req: CompletionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, CompletionRequest::default());
        assert_eq!(req.language, "python");
        assert_eq!(req.max_tokens, 256);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert!(!req.stream);
    }

    #[test]
    fn test_stop_absent_or_null_uses_defaults() {
        let absent: CompletionRequest = serde_json::from_str(r#"{"prefix":"x"}"#).unwrap();
        let null: CompletionRequest = serde_json::from_str(r#"{"stop":null}"#).unwrap();
        assert_eq!(absent.effective_stops().len(), 5);
        assert_eq!(null.effective_stops(), absent.effective_stops());
        assert_eq!(absent.effective_stops()[0], "\n\n```");
    }

    #[test]
    fn test_stop_explicit_empty_means_none() {
        let req: CompletionRequest = serde_json::from_str(r#"{"stop":[]}"#).unwrap();
        assert!(req.effective_stops().is_empty());
    }

    #[test]
    fn test_stop_sanitization() {
        let req: CompletionRequest =
            serde_json::from_str(r#"{"stop":[" a","a","", "b ", "  "]}"#).unwrap();
        assert_eq!(req.effective_stops(), vec!["a".to_string(), "b".to_string()]);

        let blanks: CompletionRequest = serde_json::from_str(r#"{"stop":["", "  "]}"#).unwrap();
        assert!(blanks.effective_stops().is_empty());
    }

    #[test]
    fn test_validate_bounds() {
        let mut req = CompletionRequest::default();
        assert!(req.validate().is_ok());

        req.max_tokens = 0;
        assert!(req.validate().is_err());
        req.max_tokens = 513;
        assert!(req.validate().is_err());
        req.max_tokens = 512;
        assert!(req.validate().is_ok());

        req.temperature = 1.5;
        assert!(req.validate().is_err());
        req.temperature = -0.1;
        assert!(req.validate().is_err());
        req.temperature = 0.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_id_shape() {
        let a = new_request_id();
        let b = new_request_id();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_options() {
        let req = CompletionRequest {
            max_tokens: 32,
            stop: Some(vec!["\n".to_string()]),
            ..Default::default()
        };
        let options = req.generate_options();
        assert_eq!(options.max_tokens, 32);
        // "\n" 去空白后为空，被丢弃
        assert!(options.stop.is_empty());
    }

    #[test]
    fn test_normalized_language() {
        let req = CompletionRequest {
            language: "  Rust ".to_string(),
            ..Default::default()
        };
        assert_eq!(req.normalized_language(), "rust");
    }
}
