//! 推理后端层
//!
//! 提供与文本生成后端的 HTTP 通信能力。
//! 后端层只负责 HTTP 请求/响应和片段切分，不包含补全后处理逻辑。
//!
//! # 架构设计
//!
//! ```text
//! backends/
//! ├── traits.rs          # InferenceBackend trait 定义
//! └── ollama.rs          # Ollama /api/generate 后端
//! ```

pub mod ollama;
pub mod traits;

// 重新导出核心类型
pub use ollama::OllamaBackend;
pub use traits::{
    error_chain, BackendError, BackendErrorKind, BackendResult, FragmentStream, GenerateOptions,
    InferenceBackend,
};
