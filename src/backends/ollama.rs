//! Ollama 后端
//!
//! 调用 `/api/generate`：非流式返回一个 JSON，流式返回 NDJSON，
//! 每行的 `response` 字段是一个文本片段。

use super::traits::{
    error_chain, BackendError, BackendErrorKind, BackendResult, FragmentStream, GenerateOptions,
    InferenceBackend,
};
use crate::config::BackendConfig;
use crate::stream::parsers::NdjsonDecoder;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    temperature: f32,
    num_ctx: u32,
    num_predict: u32,
    repeat_penalty: f32,
    stop: &'a [String],
}

/// Ollama HTTP 后端
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    num_ctx: u32,
    repeat_penalty: f32,
}

impl OllamaBackend {
    /// 根据配置创建后端
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .build()
            .map_err(|e| BackendError::new(BackendErrorKind::Other, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url(&config.url),
            model: config.model.clone(),
            timeout,
            num_ctx: config.num_ctx,
            repeat_penalty: config.repeat_penalty,
        })
    }

    /// 后端根地址（不含 `/api/generate`）
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
        stream: bool,
    ) -> GenerateBody<'a> {
        GenerateBody {
            model: &self.model,
            prompt,
            stream,
            options: OllamaOptions {
                temperature: options.temperature,
                num_ctx: self.num_ctx,
                num_predict: options.max_tokens,
                repeat_penalty: self.repeat_penalty,
                stop: &options.stop,
            },
        }
    }

    async fn post_generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        stream: bool,
    ) -> BackendResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        tracing::debug!(
            "[OLLAMA] POST {} model={} stream={} prompt_len={}",
            url,
            self.model,
            stream,
            prompt.len()
        );

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&self.body(prompt, options, stream))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&text)
                .unwrap_or_else(|_| serde_json::Value::String(text.clone()));
            tracing::warn!("[OLLAMA] 后端返回错误状态 {}: {}", status.as_u16(), text);
            return Err(BackendError::from_status(status.as_u16(), text).with_detail(detail));
        }
        Ok(resp)
    }
}

/// 配置里的地址可能是根地址，也可能已经是完整的 generate 端点
fn base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix(GENERATE_PATH)
        .unwrap_or(trimmed)
        .to_string()
}

/// 解析一行 NDJSON
///
/// 行由 `NdjsonDecoder` 在字节层面切分，多字节字符跨网络块时不会被拆坏。
///
/// 返回 `Ok(None)` 表示该行没有文本；无法解析的行原样作为片段。
fn parse_line(line: &str) -> BackendResult<Option<String>> {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => {
            if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
                return Err(BackendError::new(BackendErrorKind::ServerError, err));
            }
            Ok(value
                .get("response")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()))
        }
        Err(_) => Ok(Some(line.to_string())),
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> BackendResult<String> {
        let resp = self.post_generate(prompt, options, false).await?;
        let value: serde_json::Value = resp.json().await.map_err(|e| {
            BackendError::new(BackendErrorKind::Protocol, error_chain(&e))
        })?;
        Ok(value
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> BackendResult<FragmentStream> {
        let resp = self.post_generate(prompt, options, true).await?;
        let mut bytes = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = NdjsonDecoder::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(data) => {
                        for line in decoder.feed(&data) {
                            match parse_line(&line) {
                                Ok(Some(fragment)) => yield Ok(fragment),
                                Ok(None) => {}
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("[OLLAMA] 流读取错误: {}", e);
                        yield Err(BackendError::from_reqwest(&e));
                        return;
                    }
                }
            }

            if let Some(rest) = decoder.finish() {
                match parse_line(&rest) {
                    Ok(Some(fragment)) => yield Ok(fragment),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> BackendResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, TAGS_PATH);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }
        resp.json()
            .await
            .map_err(|e| BackendError::new(BackendErrorKind::Protocol, error_chain(&e)))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(base_url("http://127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(base_url("http://127.0.0.1:11434/"), "http://127.0.0.1:11434");
        assert_eq!(
            base_url("http://127.0.0.1:11434/api/generate"),
            "http://127.0.0.1:11434"
        );
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line(r#"{"response":"def","done":false}"#).unwrap(),
            Some("def".to_string())
        );
        assert_eq!(parse_line(r#"{"response":"","done":true}"#).unwrap(), None);
        assert_eq!(
            parse_line("not json").unwrap(),
            Some("not json".to_string())
        );
        assert!(parse_line(r#"{"error":"model not found"}"#).is_err());
    }

    #[test]
    fn test_generate_body_shape() {
        let backend = OllamaBackend::new(&BackendConfig::default()).unwrap();
        let options = GenerateOptions {
            max_tokens: 64,
            temperature: 0.2,
            stop: vec!["\n\n".to_string()],
        };
        let body = serde_json::to_value(backend.body("p", &options, true)).unwrap();
        assert_eq!(body["model"], "qwen2.5-coder:7b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["options"]["num_ctx"], 2048);
        assert_eq!(body["options"]["stop"][0], "\n\n");
    }

    /// 本地起一个只返回给定分块的 `/api/generate`
    async fn chunked_backend(chunks: Vec<&'static [u8]>) -> OllamaBackend {
        use axum::{body::Body, routing::post, Router};

        let app = Router::new().route(
            GENERATE_PATH,
            post(move || {
                let chunks = chunks.clone();
                async move {
                    let body = async_stream::stream! {
                        for chunk in chunks {
                            yield Ok::<_, std::io::Error>(bytes::Bytes::from_static(chunk));
                            tokio::time::sleep(Duration::from_millis(20)).await;
                        }
                    };
                    Body::from_stream(body)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        OllamaBackend::new(&BackendConfig {
            url: format!("http://{}", addr),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_stream_keeps_multibyte_char_split_across_chunks() {
        // "é" = 0xC3 0xA9，在两个字节之间切开
        let backend = chunked_backend(vec![
            &b"{\"response\":\"caf\xC3"[..],
            &b"\xA9\"}\n{\"response\":\"\xE4\xBD"[..],
            &b"\xA0\"}\n{\"response\":\"\",\"done\":true}\n"[..],
        ])
        .await;

        let options = GenerateOptions {
            max_tokens: 8,
            temperature: 0.0,
            stop: Vec::new(),
        };
        let mut stream = backend.generate_stream("p", &options).await.unwrap();
        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment.unwrap());
        }
        assert_eq!(fragments, vec!["café".to_string(), "你".to_string()]);
    }
}
