//! 补全服务客户端
//!
//! - 非流式：`POST /complete`，按需重试
//! - 流式：优先 `POST /complete_stream`（SSE）；服务端返回 404/405/501 时
//!   回退到 `POST /complete` + `"stream": true`（NDJSON）
//!
//! 两种传输都被还原成同一个文本片段序列。

mod error;
mod fence;

pub use error::ClientError;
pub use fence::strip_md_fence;

use crate::resilience::{Retrier, RetryConfig};
use crate::stream::parsers::{coalesce_completion, extract_fragment, NdjsonDecoder, SseDecoder};
use crate::stream::{NDJSON_CONTENT_TYPE, SSE_CONTENT_TYPE};
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

/// 触发回退到 NDJSON 的状态码
pub const FALLBACK_STATUS_CODES: &[u16] = &[404, 405, 501];

/// 客户端片段流
pub type ClientFragmentStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务地址，如 `http://127.0.0.1:9000`
    pub server: String,
    /// Bearer token，为空时不发送
    pub api_key: String,
    /// 单次请求超时
    pub timeout: Duration,
    /// 附加请求头
    pub extra_headers: Vec<(String, String)>,
    /// 非流式请求的重试配置
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:9000".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(600),
            extra_headers: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// 实际使用的流式传输
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// `/complete_stream` SSE
    EventStream,
    /// `/complete` NDJSON
    JsonLines,
}

/// 流式补全结果
pub struct CompletionStream {
    pub transport: Transport,
    pub fragments: ClientFragmentStream,
}

impl CompletionStream {
    /// 读完所有片段并拼接
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(fragment) = self.fragments.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// 解析 `Key: Value` 形式的请求头
pub fn parse_extra_header(raw: &str) -> Result<(String, String), ClientError> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| ClientError::InvalidHeader(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ClientError::InvalidHeader(raw.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// 补全客户端
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    base: String,
    retrier: Retrier,
}

impl CompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (key, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(key.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeader(format!("{key}: {value}")))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            http,
            base: config.server.trim_end_matches('/').to_string(),
            retrier: Retrier::new(config.retry),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn post(
        &self,
        path: &str,
        payload: &Value,
        accept: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("[CLIENT] POST {}", url);
        self.http
            .post(&url)
            .header(ACCEPT, accept)
            .json(payload)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))
    }

    async fn complete_once(&self, payload: &Value) -> Result<String, ClientError> {
        let resp = self.post("/complete", payload, "application/json").await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(status_error(resp).await);
        }
        let value: Value = resp.json().await.map_err(|e| ClientError::from_reqwest(&e))?;
        Ok(coalesce_completion(&value))
    }

    /// 非流式补全
    ///
    /// 传输错误和 408/429/500/502/503/504 会按配置重试。
    pub async fn complete(&self, payload: &Value) -> Result<String, ClientError> {
        self.retrier
            .execute(|| self.complete_once(payload))
            .await
            .map_err(|e| {
                if e.attempts > 1 {
                    ClientError::RetriesExhausted {
                        attempts: e.attempts,
                        last: Box::new(e.last_error),
                    }
                } else {
                    e.last_error
                }
            })
    }

    /// 流式补全
    ///
    /// 先尝试 SSE，必要时回退 NDJSON；连接或状态错误在返回前报告。
    pub async fn stream(&self, payload: &Value) -> Result<CompletionStream, ClientError> {
        let resp = self
            .post("/complete_stream", payload, SSE_CONTENT_TYPE)
            .await?;
        let status = resp.status().as_u16();

        if status == 200 {
            return Ok(CompletionStream {
                transport: Transport::EventStream,
                fragments: decode_body(resp, Transport::EventStream),
            });
        }
        if !FALLBACK_STATUS_CODES.contains(&status) {
            return Err(status_error(resp).await);
        }

        tracing::info!("[CLIENT] /complete_stream 返回 {}，回退到 NDJSON", status);
        let mut fallback = payload.clone();
        if let Some(obj) = fallback.as_object_mut() {
            obj.insert("stream".to_string(), Value::Bool(true));
        }
        let accept = format!("{}, application/json", NDJSON_CONTENT_TYPE);
        let resp = self.post("/complete", &fallback, &accept).await?;
        if resp.status() != StatusCode::OK {
            return Err(status_error(resp).await);
        }
        Ok(CompletionStream {
            transport: Transport::JsonLines,
            fragments: decode_body(resp, Transport::JsonLines),
        })
    }

    /// 探测服务健康状态
    pub async fn health(&self) -> Result<Value, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        if resp.status() != StatusCode::OK {
            return Err(status_error(resp).await);
        }
        resp.json().await.map_err(|e| ClientError::from_reqwest(&e))
    }
}

async fn status_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ClientError::Status { status, body }
}

/// 按传输类型切分的单元解码器
enum UnitDecoder {
    Sse(SseDecoder),
    Ndjson(NdjsonDecoder),
}

impl UnitDecoder {
    fn new(transport: Transport) -> Self {
        match transport {
            Transport::EventStream => Self::Sse(SseDecoder::new()),
            Transport::JsonLines => Self::Ndjson(NdjsonDecoder::new()),
        }
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        match self {
            Self::Sse(d) => d.feed(chunk),
            Self::Ndjson(d) => d.feed(chunk),
        }
    }

    fn finish(&mut self) -> Option<String> {
        match self {
            Self::Sse(d) => d.finish(),
            Self::Ndjson(d) => d.finish(),
        }
    }
}

/// 把响应体转换为片段流
///
/// 每个单元先经 `extract_fragment` 取文本，没有可识别字段时得到空片段。
/// 空片段在这里丢弃，不交给调用方：meta、final、done 单元因此不出现在流中，
/// SSE 与 NDJSON 两种传输得到相同的片段序列，拼接结果也不受影响。
fn decode_body(resp: reqwest::Response, transport: Transport) -> ClientFragmentStream {
    let mut bytes = resp.bytes_stream();

    let stream = async_stream::stream! {
        let mut decoder = UnitDecoder::new(transport);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(data) => {
                    for unit in decoder.feed(&data) {
                        let fragment = extract_fragment(&unit);
                        if !fragment.is_empty() {
                            yield Ok(fragment);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("[CLIENT] 流读取错误: {}", e);
                    yield Err(ClientError::from_reqwest(&e));
                    return;
                }
            }
        }

        if let Some(unit) = decoder.finish() {
            let fragment = extract_fragment(&unit);
            if !fragment.is_empty() {
                yield Ok(fragment);
            }
        }
    };

    Box::pin(stream)
}
