//! 补全请求错误类型
//!
//! 定义请求处理过程中可能发生的错误及其 HTTP 映射

use crate::backends::{BackendError, BackendErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// 补全处理错误
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    /// 请求字段越界，在调用后端之前拒绝
    #[error("请求参数无效: {0}")]
    Validation(String),

    /// 缺少 Bearer token
    #[error("Missing Bearer token")]
    MissingToken,

    /// token 不匹配
    #[error("Invalid token")]
    InvalidToken,

    /// 后端返回了非成功状态
    #[error("后端返回错误状态 {status}")]
    Backend {
        status: u16,
        detail: serde_json::Value,
    },

    /// 网络错误、超时、DNS 失败
    #[error("后端连接失败: {0}")]
    Transport(String),

    /// 后端流格式异常
    #[error("后端响应格式异常: {0}")]
    Protocol(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl CompletionError {
    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            CompletionError::Validation(_) => 422,
            CompletionError::MissingToken => 401,
            CompletionError::InvalidToken => 403,
            CompletionError::Backend { .. } => 502,
            CompletionError::Transport(_) => 502,
            CompletionError::Protocol(_) => 502,
            CompletionError::Internal(_) => 500,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            CompletionError::Validation(_) => "validation_error",
            CompletionError::MissingToken | CompletionError::InvalidToken => {
                "authentication_error"
            }
            CompletionError::Backend { .. } => "backend_error",
            CompletionError::Transport(_) => "transport_error",
            CompletionError::Protocol(_) => "protocol_error",
            CompletionError::Internal(_) => "internal_error",
        }
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "message": self.to_string(),
            "type": self.error_type(),
            "code": self.status_code()
        });
        if let CompletionError::Backend { detail, .. } = self {
            error["detail"] = serde_json::json!({ "ollama_error": detail });
        }
        serde_json::json!({ "error": error })
    }

    /// 记录带上下文的错误日志
    pub fn log_with_context(&self, request_id: &str) {
        tracing::error!(
            request_id = %request_id,
            error_type = %self.error_type(),
            error_message = %self.to_string(),
            "Completion request failed"
        );
    }
}

impl From<BackendError> for CompletionError {
    fn from(err: BackendError) -> Self {
        match (err.kind, err.status_code) {
            (_, Some(status)) => CompletionError::Backend {
                status,
                detail: err.detail.unwrap_or(serde_json::Value::String(err.message)),
            },
            (BackendErrorKind::Protocol, None) => CompletionError::Protocol(err.message),
            _ => CompletionError::Transport(err.message),
        }
    }
}

impl IntoResponse for CompletionError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_error_status_codes() {
        assert_eq!(CompletionError::Validation("x".into()).status_code(), 422);
        assert_eq!(CompletionError::MissingToken.status_code(), 401);
        assert_eq!(CompletionError::InvalidToken.status_code(), 403);
        assert_eq!(
            CompletionError::Backend {
                status: 500,
                detail: serde_json::Value::Null
            }
            .status_code(),
            502
        );
        assert_eq!(CompletionError::Transport("x".into()).status_code(), 502);
    }

    #[test]
    fn test_backend_error_carries_detail() {
        let err: CompletionError =
            BackendError::from_status(404, "model not found").into();
        let json = err.to_json();
        assert_eq!(json["error"]["code"], 502);
        assert_eq!(json["error"]["type"], "backend_error");
        assert_eq!(json["error"]["detail"]["ollama_error"], "model not found");
    }

    #[test]
    fn test_network_error_is_transport() {
        let err: CompletionError =
            BackendError::new(BackendErrorKind::Timeout, "operation timed out").into();
        assert!(matches!(err, CompletionError::Transport(_)));
    }
}
