//! codecast：代码补全网关
//!
//! 在 Ollama 兼容的 `/api/generate` 后端之前提供补全 API：
//! 根据光标上下文构建 prompt，批量或流式获取后端输出，并确定性地清洗为可插入的补全。

pub mod backends;
pub mod client;
pub mod config;
pub mod eval;
pub mod loadgen;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod processor;
pub mod prompt;
pub mod resilience;
pub mod server;
pub mod stream;
pub mod telemetry;

pub use config::Config;
pub use server::{build_router, AppState};
