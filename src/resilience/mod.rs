//! 容错机制模块
//!
//! 提供带指数退避的重试

mod retry;

pub use retry::{Retrier, RetryConfig, RetryError, RetryableError, RETRYABLE_STATUS_CODES};
