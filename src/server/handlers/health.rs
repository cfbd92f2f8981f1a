//! 健康检查与模型列表

use crate::processor::CompletionError;
use crate::server::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// 从 `/api/tags` 响应中取出模型名称
pub fn model_names(tags: &Value) -> Vec<String> {
    tags.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// GET /health
///
/// 后端不可达时返回 `degraded`，HTTP 状态仍为 200。
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let (status, models) = match state.backend.list_models().await {
        Ok(tags) => ("ok", model_names(&tags)),
        Err(e) => {
            tracing::warn!("[HEALTH] 后端 {} 探活失败: {}", state.backend.name(), e);
            ("degraded", Vec::new())
        }
    };

    Json(json!({
        "status": status,
        "model": state.backend.model(),
        "available_models": models,
    }))
}

/// GET /models
pub async fn models(State(state): State<AppState>) -> Response {
    match state.backend.list_models().await {
        Ok(tags) => Json(tags).into_response(),
        Err(e) => {
            tracing::warn!("[HEALTH] 查询模型列表失败: {}", e);
            CompletionError::from(e).into_response()
        }
    }
}
