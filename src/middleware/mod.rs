//! Middleware 模块
//!
//! 提供 HTTP 请求处理的中间件组件

pub mod auth;
pub mod request_id;

pub use auth::{require_api_key, ApiKeyGuard};
pub use request_id::{request_id_layer, RequestId, REQUEST_ID_HEADER};
