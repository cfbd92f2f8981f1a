//! 客户端错误类型

use crate::backends::error_chain;
use crate::resilience::RetryableError;
use thiserror::Error;

/// 客户端错误
#[derive(Debug, Error)]
pub enum ClientError {
    /// 服务端返回非 200 状态
    #[error("[HTTP {status}] {body}")]
    Status { status: u16, body: String },

    /// 连接失败、连接被重置等
    #[error("传输错误: {0}")]
    Transport(String),

    /// 请求超时
    #[error("请求超时: {0}")]
    Timeout(String),

    /// 响应体不是预期的 JSON
    #[error("响应解析失败: {0}")]
    Decode(String),

    /// 重试次数用尽
    #[error("重试耗尽: 尝试 {attempts} 次后失败 - {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    /// `--extra-header` 格式或取值无效
    #[error("无效的请求头: {0}")]
    InvalidHeader(String),

    /// 构建 HTTP 客户端失败
    #[error("创建 HTTP 客户端失败: {0}")]
    Build(String),
}

impl ClientError {
    /// 从 reqwest 错误转换，保留完整错误链
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let message = error_chain(err);
        if err.is_timeout() {
            ClientError::Timeout(message)
        } else if err.is_decode() {
            ClientError::Decode(message)
        } else {
            ClientError::Transport(message)
        }
    }

    /// HTTP 状态码（如果有）
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

impl RetryableError for ClientError {
    fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let status = ClientError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(status.status_code(), Some(503));
        assert!(ClientError::Transport("refused".into()).is_transient());
        assert!(ClientError::Timeout("timed out".into()).is_transient());
        assert!(!ClientError::Decode("bad json".into()).is_transient());
        assert!(!ClientError::InvalidHeader("x".into()).is_transient());
    }

    #[test]
    fn test_status_display() {
        let err = ClientError::Status {
            status: 401,
            body: "{\"detail\":\"Missing Bearer token\"}".to_string(),
        };
        assert_eq!(err.to_string(), "[HTTP 401] {\"detail\":\"Missing Bearer token\"}");

        let exhausted = ClientError::RetriesExhausted {
            attempts: 3,
            last: Box::new(err),
        };
        assert_eq!(exhausted.status(), Some(401));
    }
}
