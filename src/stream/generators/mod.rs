//! 流格式生成器
//!
//! 将 `StreamEvent` 编码为线上格式。
//!
//! # 支持的格式
//!
//! - SSE (`event: xxx\ndata: {...}\n\n`)，用于 `/complete_stream`
//! - NDJSON（每行一个 JSON），用于 `/complete` 的 `stream: true`

pub mod ndjson;
pub mod sse;

pub use ndjson::{encode_ndjson, NDJSON_CONTENT_TYPE};
pub use sse::{encode_sse, SSE_CONTENT_TYPE};
