//! 统计计算
//!
//! 百分位、QPS 与错误分类

use crate::telemetry::types::{ErrorClass, ErrorSample, FailureCause};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// 错误样本最多保留条数
pub const MAX_ERROR_SAMPLES: usize = 5;

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out"];
const CONNECTION_KEYWORDS: &[&str] = &[
    "refused",
    "10061",
    "connection reset",
    "reset by peer",
    "broken pipe",
];
const DNS_KEYWORDS: &[&str] = &[
    "dns",
    "name or service not known",
    "getaddrinfo",
    "failed to lookup address",
    "nodename nor servname",
];

/// reqwest 错误消息里的 `for url (...)` 片段
static URL_SEGMENT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\s*for url \([^)]*\)").ok());

/// 对已排序的耗时列表取百分位
///
/// 空列表返回 `None`；`p <= 0` 取最小值，`p >= 100` 取最大值，
/// 否则取下标 `floor(n * p / 100)`（越界时取最后一个）。
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    if p <= 0.0 {
        return sorted.first().copied();
    }
    if p >= 100.0 {
        return sorted.last().copied();
    }
    let k = ((sorted.len() as f64) * p / 100.0).floor() as usize;
    sorted.get(k.min(last)).copied()
}

/// 线性插值百分位，`p` 取值 0..=1，输入无需排序
///
/// 空列表返回 0。
pub fn interpolated_percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let last = sorted.len() - 1;
    let k = last as f64 * p.clamp(0.0, 1.0);
    let lower = k.floor() as usize;
    let upper = (lower + 1).min(last);
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] * (upper as f64 - k) + sorted[upper] * (k - lower as f64)
}

/// 按优先级分类：状态码 → 超时 → 连接 → DNS → 其他
///
/// 关键字只在去掉请求地址后的消息里查找。
pub fn classify_error(cause: &FailureCause) -> ErrorClass {
    let message = match cause {
        FailureCause::Status(code) => return ErrorClass::Http(*code),
        FailureCause::Message(msg) => match URL_SEGMENT.as_ref() {
            Some(re) => re.replace_all(msg, "").to_lowercase(),
            None => msg.to_lowercase(),
        },
    };
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if contains_any(TIMEOUT_KEYWORDS) {
        ErrorClass::Timeout
    } else if contains_any(CONNECTION_KEYWORDS) {
        ErrorClass::Connection
    } else if contains_any(DNS_KEYWORDS) {
        ErrorClass::Dns
    } else {
        ErrorClass::Other
    }
}

/// 每秒请求数；耗时为 0 时返回 0
pub fn qps(count: usize, wall_secs: f64) -> f64 {
    if wall_secs > 0.0 {
        count as f64 / wall_secs
    } else {
        0.0
    }
}

/// 错误分类计数
pub fn error_breakdown(errors: &[ErrorSample]) -> BTreeMap<ErrorClass, usize> {
    let mut breakdown = BTreeMap::new();
    for ErrorSample(cause, _) in errors {
        *breakdown.entry(classify_error(cause)).or_insert(0) += 1;
    }
    breakdown
}
