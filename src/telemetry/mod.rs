//! 压测统计模块
//!
//! 提供延迟百分位、QPS 计算与错误分类，压测和批量评测共用

mod stats;
mod types;

pub use stats::{
    classify_error, error_breakdown, interpolated_percentile, percentile, qps, MAX_ERROR_SAMPLES,
};
pub use types::{ErrorClass, ErrorSample, FailureCause, LoadSummary};

#[cfg(test)]
mod tests;
