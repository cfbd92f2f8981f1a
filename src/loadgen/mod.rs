//! 压测驱动
//!
//! 固定总请求数，用计数信号量限制同时在途的请求数。
//! 每个任务持有一个 `OwnedSemaphorePermit`，任务结束时自动释放。
//! 超时只做分类，不重试。

use crate::backends::error_chain;
use crate::telemetry::{
    error_breakdown, percentile, qps, ErrorSample, FailureCause, LoadSummary, MAX_ERROR_SAMPLES,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;

/// 压测错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("并发数必须大于 0")]
    InvalidConcurrency,

    #[error("读取 payload 文件失败: {0}")]
    PayloadIo(#[from] std::io::Error),

    #[error("payload 不是有效的 JSON: {0}")]
    PayloadJson(#[from] serde_json::Error),

    #[error("创建 HTTP 客户端失败: {0}")]
    Client(String),
}

/// 默认 payload：极小的请求，排除 prompt 大小对连接问题的干扰
pub fn default_payload() -> Value {
    json!({
        "prefix": "x",
        "suffix": "",
        "language": "python",
        "max_tokens": 8
    })
}

/// 读取 payload，未指定文件时使用默认值
pub fn load_payload(path: Option<&Path>) -> Result<Value, LoadError> {
    match path {
        Some(p) => Ok(serde_json::from_str(&std::fs::read_to_string(p)?)?),
        None => Ok(default_payload()),
    }
}

/// 压测目标
#[async_trait]
pub trait LoadTarget: Send + Sync {
    /// 发出一次请求；非 200 或传输错误返回失败原因
    async fn fire(&self) -> Result<(), FailureCause>;
}

/// HTTP POST 目标
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: reqwest::Client,
    url: String,
    api_key: String,
    payload: Value,
}

impl HttpTarget {
    pub fn new(
        server: &str,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
        payload: Value,
    ) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{}", server.trim_end_matches('/'), endpoint),
            api_key: api_key.to_string(),
            payload,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LoadTarget for HttpTarget {
    async fn fire(&self) -> Result<(), FailureCause> {
        let mut request = self.client.post(&self.url).json(&self.payload);
        if !self.api_key.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", self.api_key));
        }

        let resp = request.send().await.map_err(transport_failure)?;
        let status = resp.status().as_u16();
        // 读完响应体，耗时包含生成时间
        resp.bytes().await.map_err(transport_failure)?;

        if status == 200 {
            Ok(())
        } else {
            Err(FailureCause::Status(status))
        }
    }
}

/// 传输错误的消息不带请求地址，地址里的字样不参与分类
fn transport_failure(err: reqwest::Error) -> FailureCause {
    FailureCause::Message(error_chain(&err.without_url()))
}

/// 一次压测的原始结果
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// 成功请求耗时（秒），按完成顺序
    pub successes: Vec<f64>,
    /// 失败请求，按完成顺序
    pub errors: Vec<ErrorSample>,
    /// 总耗时（秒）
    pub wall_secs: f64,
}

impl LoadReport {
    /// 生成汇总
    pub fn summarize(&self, server: &str, endpoint: &str, timeout_sec: f64) -> LoadSummary {
        let mut sorted = self.successes.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success = self.successes.len();
        let fail = self.errors.len();

        LoadSummary {
            server: server.to_string(),
            endpoint: endpoint.to_string(),
            timeout_sec,
            total_requests: success + fail,
            success,
            fail,
            qps_success: qps(success, self.wall_secs),
            qps_total: qps(success + fail, self.wall_secs),
            p95_sec: percentile(&sorted, 95.0),
            p99_sec: percentile(&sorted, 99.0),
            error_breakdown: error_breakdown(&self.errors),
            error_samples: self.errors.iter().take(MAX_ERROR_SAMPLES).cloned().collect(),
            total_time_sec: self.wall_secs,
        }
    }
}

/// 压测驱动器
#[derive(Debug, Clone)]
pub struct LoadGenerator {
    concurrency: usize,
    total: usize,
}

impl LoadGenerator {
    pub fn new(concurrency: usize, total: usize) -> Result<Self, LoadError> {
        if concurrency == 0 {
            return Err(LoadError::InvalidConcurrency);
        }
        Ok(Self { concurrency, total })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 发出全部请求并等待完成
    pub async fn run(&self, target: Arc<dyn LoadTarget>) -> LoadReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let successes = Arc::new(Mutex::new(Vec::with_capacity(self.total)));
        let errors = Arc::new(Mutex::new(Vec::new()));

        tracing::info!(
            "[LOADGEN] 开始压测: total={} concurrency={}",
            self.total,
            self.concurrency
        );

        let start = Instant::now();
        let mut handles = Vec::with_capacity(self.total);
        for _ in 0..self.total {
            let semaphore = semaphore.clone();
            let target = target.clone();
            let successes = successes.clone();
            let errors = errors.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let started = Instant::now();
                let outcome = target.fire().await;
                let elapsed = started.elapsed().as_secs_f64();
                match outcome {
                    Ok(()) => successes.lock().push(elapsed),
                    Err(cause) => errors.lock().push(ErrorSample(cause, elapsed)),
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("[LOADGEN] 任务异常退出: {}", e);
                errors
                    .lock()
                    .push(ErrorSample(FailureCause::Message(e.to_string()), 0.0));
            }
        }
        let wall_secs = start.elapsed().as_secs_f64();

        let report = LoadReport {
            successes: std::mem::take(&mut *successes.lock()),
            errors: std::mem::take(&mut *errors.lock()),
            wall_secs,
        };
        tracing::info!(
            "[LOADGEN] 完成: success={} fail={} wall={:.3}s",
            report.successes.len(),
            report.errors.len(),
            wall_secs
        );
        report
    }
}
