//! SSE 生成器
//!
//! 格式：
//! ```text
//! event: delta
//! data: {"delta":"    return"}
//!
//! ```

use crate::stream::events::StreamEvent;

/// 把事件编码为一个 SSE 帧（以空行结尾）
pub fn encode_sse(event: &StreamEvent) -> String {
    format!("event: {}\ndata: {}\n\n", event.name(), event.data())
}

/// SSE 响应使用的 Content-Type
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_meta() {
        let frame = encode_sse(&StreamEvent::Meta {
            request_id: "0f1e2d3c".to_string(),
        });
        assert_eq!(frame, "event: meta\ndata: {\"request_id\":\"0f1e2d3c\"}\n\n");
    }

    #[test]
    fn test_encode_delta_escapes_newlines() {
        let frame = encode_sse(&StreamEvent::Delta {
            delta: "a\n\nb".to_string(),
        });
        // JSON 转义保证负载里不会出现帧分隔符
        assert_eq!(frame, "event: delta\ndata: {\"delta\":\"a\\n\\nb\"}\n\n");
        assert_eq!(frame.matches("\n\n").count(), 1);
    }

    #[test]
    fn test_encode_done() {
        assert_eq!(encode_sse(&StreamEvent::Done), "event: done\ndata: {}\n\n");
    }
}
