//! 流式处理层
//!
//! 提供补全流的事件定义、服务端编码与客户端解码：
//! - 事件类型定义 (events)
//! - 事件帧器 (framer)
//! - 线上格式生成 (generators)
//! - 线上格式解析 (parsers)
//!
//! # 架构设计
//!
//! ```text
//! 服务端：FragmentStream ──> [StreamFramer] ──> StreamEvent ──> [encode_sse / encode_ndjson] ──> HTTP body
//! 客户端：HTTP body ──> [SseDecoder / NdjsonDecoder] ──> data ──> [extract_fragment] ──> 片段
//! ```

pub mod events;
pub mod framer;
pub mod generators;
pub mod parsers;

// 重新导出核心类型
pub use events::StreamEvent;
pub use framer::{EventSink, FramerOutcome, FramerState, SinkClosed, StreamFramer};
pub use generators::{encode_ndjson, encode_sse, NDJSON_CONTENT_TYPE, SSE_CONTENT_TYPE};
pub use parsers::{coalesce_completion, extract_fragment, NdjsonDecoder, SseDecoder};
