//! Bearer token 认证
//!
//! 配置了 API Key 时要求 `Authorization: Bearer <key>`：
//! 缺失或格式不对返回 401，token 不匹配返回 403。API Key 为空时不校验。

use crate::processor::CompletionError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// API Key 校验器
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGuard {
    expected: Arc<str>,
}

impl ApiKeyGuard {
    pub fn new(expected: &str) -> Self {
        Self {
            expected: Arc::from(expected),
        }
    }

    /// 是否启用认证
    pub fn is_enabled(&self) -> bool {
        !self.expected.is_empty()
    }

    /// 校验请求头
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), CompletionError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(CompletionError::MissingToken)?;

        if token.as_bytes().ct_eq(self.expected.as_bytes()).into() {
            Ok(())
        } else {
            Err(CompletionError::InvalidToken)
        }
    }
}

/// 认证中间件，配合 `axum::middleware::from_fn_with_state` 使用
pub async fn require_api_key(
    State(guard): State<ApiKeyGuard>,
    request: Request,
    next: Next,
) -> Response {
    match guard.verify(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!("[AUTH] 拒绝请求 {}: {}", request.uri().path(), err);
            err.into_response()
        }
    }
}
