//! 推理后端 Trait 定义
//!
//! 定义文本生成后端的核心接口。
//! 后端层只负责 HTTP 请求/响应和片段切分，不做任何补全后处理。

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// 文本片段流
pub type FragmentStream = Pin<Box<dyn Stream<Item = BackendResult<String>> + Send>>;

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端失败的大类，决定映射到哪种网关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 连接失败、连接重置、DNS
    NetworkError,
    Timeout,
    /// 5xx
    ServerError,
    /// 4xx
    BadRequest,
    /// 响应不是预期的 JSON / NDJSON
    Protocol,
    Other,
}

impl BackendErrorKind {
    pub fn for_status(status: u16) -> Self {
        match status {
            400..=499 => Self::BadRequest,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NetworkError",
            Self::Timeout => "Timeout",
            Self::ServerError => "ServerError",
            Self::BadRequest => "BadRequest",
            Self::Protocol => "Protocol",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端调用失败
///
/// `status_code` 只在后端给出了 HTTP 响应时存在；`detail` 保存后端的错误体，
/// 原样放进网关错误响应的 `ollama_error` 字段。
#[derive(Debug, Clone)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub detail: Option<serde_json::Value>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            detail: None,
        }
    }

    /// 后端返回了非成功状态码
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            ..Self::new(BackendErrorKind::for_status(status), message)
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// reqwest 的超时和解码失败单独归类，其余视为网络错误
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = match (err.is_timeout(), err.is_decode()) {
            (true, _) => BackendErrorKind::Timeout,
            (false, true) => BackendErrorKind::Protocol,
            _ => BackendErrorKind::NetworkError,
        };
        Self::new(kind, error_chain(err))
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(status) = self.status_code {
            write!(f, " ({})", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// 展开错误链（reqwest 的顶层消息往往不包含根因）
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

/// 生成参数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    /// 最大生成 token 数
    pub max_tokens: u32,
    /// 采样温度
    pub temperature: f32,
    /// 停止序列
    pub stop: Vec<String>,
}

/// 推理后端 Trait
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// 非流式生成，返回完整原始文本
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> BackendResult<String>;

    /// 流式生成
    ///
    /// 连接建立和状态码检查在返回前完成；之后的错误通过流的 `Err` 项传递。
    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> BackendResult<FragmentStream>;

    /// 列出可用模型（后端原始 JSON）
    async fn list_models(&self) -> BackendResult<serde_json::Value>;

    /// 当前使用的模型名称
    fn model(&self) -> &str;

    /// 获取后端名称
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status_when_present() {
        let err = BackendError::new(BackendErrorKind::Timeout, "operation timed out");
        assert_eq!(err.to_string(), "Timeout: operation timed out");

        let err = BackendError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "ServerError (502): bad gateway");
    }

    #[test]
    fn test_status_classification() {
        for (status, kind) in [
            (404, BackendErrorKind::BadRequest),
            (429, BackendErrorKind::BadRequest),
            (500, BackendErrorKind::ServerError),
            (302, BackendErrorKind::Other),
        ] {
            let err = BackendError::from_status(status, "x");
            assert_eq!(err.kind, kind, "status {status}");
            assert_eq!(err.status_code, Some(status));
            assert!(err.detail.is_none());
        }
    }

    #[test]
    fn test_error_chain_dedupes_repeated_text() {
        #[derive(Debug)]
        struct Inner;
        impl std::fmt::Display for Inner {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "Connection refused")
            }
        }
        impl std::error::Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "error sending request")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        assert_eq!(
            error_chain(&Outer(Inner)),
            "error sending request: Connection refused"
        );
    }
}
