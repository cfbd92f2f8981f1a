//! 重试机制实现
//!
//! 指数退避，不加抖动：第 N 次重试前等待 `base * 2^N`，不超过上限。
//! 只用于客户端的非流式请求。

use std::future::Future;
use std::time::Duration;

/// 可重试的 HTTP 状态码
pub const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// 重试配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    /// 基础等待时间
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 可重试的状态码
    pub retryable_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            retryable_codes: RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// 创建新的重试配置
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            retryable_codes: RETRYABLE_STATUS_CODES.to_vec(),
        }
    }

    /// 检查状态码是否可重试
    pub fn is_retryable(&self, status_code: u16) -> bool {
        self.retryable_codes.contains(&status_code)
    }
}

/// 重试判定所需的错误信息
pub trait RetryableError {
    /// HTTP 状态码（如果有）
    fn status_code(&self) -> Option<u16>;

    /// 没有状态码时是否属于可重试的传输错误
    fn is_transient(&self) -> bool {
        self.status_code().is_none()
    }
}

/// 重试错误
#[derive(Debug, Clone)]
pub struct RetryError<E> {
    /// 尝试次数（包括初始请求）
    pub attempts: u32,
    /// 最后一次错误
    pub last_error: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "重试耗尽: 尝试 {} 次后失败 - {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// 重试器
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    config: RetryConfig,
}

impl Retrier {
    /// 创建新的重试器
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 获取配置
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 计算第 N 次重试前的等待时间
    ///
    /// 公式: min(base * 2^attempt, max)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// 完整的等待序列
    pub fn compute_backoff_sequence(&self) -> Vec<Duration> {
        (0..self.config.max_retries)
            .map(|attempt| self.backoff_delay(attempt))
            .collect()
    }

    fn should_retry<E: RetryableError>(&self, error: &E) -> bool {
        match error.status_code() {
            Some(code) => self.config.is_retryable(code),
            None => error.is_transient(),
        }
    }

    /// 带重试执行异步操作
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Debug,
    {
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error) || attempts > self.config.max_retries {
                        return Err(RetryError {
                            attempts,
                            last_error: error,
                        });
                    }

                    let delay = self.backoff_delay(attempts - 1);
                    tracing::warn!(
                        "[RETRY] 第 {} 次尝试失败: {:?}，{:?} 后重试",
                        attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
