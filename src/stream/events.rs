//! 补全流事件类型
//!
//! 服务端推送、客户端消费的中间表示，与具体传输格式（SSE / NDJSON）解耦。
//!
//! # 事件顺序
//!
//! ```text
//! meta ──> delta* ──> final ──> done
//! ```
//!
//! 所有 `delta` 拼接起来等于传入后处理器、用于生成 `final` 的原始文本。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 补全流事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// 流开始，携带请求 ID
    Meta {
        /// 请求 ID
        request_id: String,
    },

    /// 原始文本片段，逐字转发
    Delta {
        /// 片段内容
        delta: String,
    },

    /// 后处理完成的最终补全
    Final {
        /// 清理后的补全文本
        completion: String,
    },

    /// 流结束
    Done,
}

impl StreamEvent {
    /// 事件名（SSE `event:` 字段）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Meta { .. } => "meta",
            Self::Delta { .. } => "delta",
            Self::Final { .. } => "final",
            Self::Done => "done",
        }
    }

    /// 事件负载（SSE `data:` 字段）
    pub fn data(&self) -> Value {
        match self {
            Self::Meta { request_id } => json!({ "request_id": request_id }),
            Self::Delta { delta } => json!({ "delta": delta }),
            Self::Final { completion } => json!({ "completion": completion }),
            Self::Done => json!({}),
        }
    }

    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
