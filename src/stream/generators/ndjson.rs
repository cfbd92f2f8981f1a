//! NDJSON 生成器
//!
//! 每行一个 JSON 对象：
//! ```text
//! {"request_id":"0f1e2d3c"}
//! {"delta":"    return"}
//! {"completion":"    return x","done":true}
//! ```
//!
//! `final` 与 `done` 合并成一行，`done` 本身不单独输出。

use crate::stream::events::StreamEvent;
use serde_json::json;

/// NDJSON 响应使用的 Content-Type
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// 把事件编码为一行 NDJSON
///
/// 返回 `None` 表示该事件在 NDJSON 中没有对应行。
pub fn encode_ndjson(event: &StreamEvent) -> Option<String> {
    let value = match event {
        StreamEvent::Final { completion } => json!({ "completion": completion, "done": true }),
        StreamEvent::Done => return None,
        other => other.data(),
    };
    Some(format!("{}\n", value))
}
