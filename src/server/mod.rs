//! HTTP 服务
//!
//! 路由表：
//!
//! ```text
//! POST /complete          需要认证，JSON 或 NDJSON 流
//! POST /complete_stream   需要认证，SSE 流
//! GET  /health            后端探活
//! GET  /models            后端模型列表
//! ```

pub mod handlers;

use crate::backends::InferenceBackend;
use crate::config::Config;
use crate::middleware::{request_id_layer, require_api_key, ApiKeyGuard};
use crate::processor::Postprocessor;
use crate::prompt::PromptBuilder;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// 各 handler 共享的只读状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn InferenceBackend>,
    pub postprocessor: Arc<Postprocessor>,
    pub prompt: Arc<PromptBuilder>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn InferenceBackend>) -> Self {
        let postprocessor = Postprocessor::new(config.completion.dedupe_window)
            .with_enabled(config.completion.postprocess_enabled);
        Self {
            config: Arc::new(config),
            backend,
            postprocessor: Arc::new(postprocessor),
            prompt: Arc::new(PromptBuilder::default()),
        }
    }
}

/// `*` 表示任意来源；无法解析的来源会被忽略
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("[SERVER] 忽略无效的 CORS 来源: {}", o);
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    let guard = ApiKeyGuard::new(&state.config.auth.api_key);
    if !guard.is_enabled() {
        tracing::warn!("[SERVER] 未配置 API_KEY，补全接口不做认证");
    }

    let completion_routes = Router::new()
        .route("/complete", post(handlers::complete))
        .route("/complete_stream", post(handlers::complete_stream))
        .route_layer(middleware::from_fn_with_state(guard, require_api_key));

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models));

    Router::new()
        .merge(completion_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_layer))
                .layer(cors_layer(&state.config.server.allow_origins)),
        )
        .layer(DefaultBodyLimit::max(state.config.server.body_limit))
        .with_state(state)
}
