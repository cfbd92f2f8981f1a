//! 遥测类型定义
//!
//! 定义压测结果、错误分类等核心类型

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorClass {
    /// 非 200 状态码
    Http(u16),
    /// 超时
    Timeout,
    /// 连接被拒绝或被重置
    Connection,
    /// 域名解析失败
    Dns,
    /// 其他
    Other,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Http(code) => write!(f, "HTTP_{}", code),
            ErrorClass::Timeout => write!(f, "TIMEOUT"),
            ErrorClass::Connection => write!(f, "CONNECTION"),
            ErrorClass::Dns => write!(f, "DNS"),
            ErrorClass::Other => write!(f, "OTHER"),
        }
    }
}

impl Serialize for ErrorClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 单次请求的失败原因
///
/// 序列化为裸值：状态码是数字，错误消息是字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FailureCause {
    Status(u16),
    Message(String),
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Status(code) => write!(f, "HTTP {}", code),
            FailureCause::Message(msg) => write!(f, "{}", msg),
        }
    }
}

/// 失败样本：`[原因, 耗时秒]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSample(pub FailureCause, pub f64);

/// 压测汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub server: String,
    pub endpoint: String,
    pub timeout_sec: f64,
    pub total_requests: usize,
    pub success: usize,
    pub fail: usize,
    pub qps_success: f64,
    pub qps_total: f64,
    pub p95_sec: Option<f64>,
    pub p99_sec: Option<f64>,
    pub error_breakdown: BTreeMap<ErrorClass, usize>,
    pub error_samples: Vec<ErrorSample>,
    pub total_time_sec: f64,
}
