//! 流式数据解析器
//!
//! 客户端侧：把 SSE 或 NDJSON 字节流还原为统一的文本片段序列。
//!
//! # 支持的格式
//!
//! - SSE (`/complete_stream`)
//! - NDJSON (`/complete` + `stream: true`)

pub mod fragment;
pub mod ndjson;
pub mod sse;

pub use fragment::{coalesce_completion, extract_fragment};
pub use ndjson::NdjsonDecoder;
pub use sse::SseDecoder;
