//! 补全处理器
//!
//! - `POST /complete`：非流式返回 `{request_id, completion}`，`stream: true` 时返回 NDJSON
//! - `POST /complete_stream`：SSE 事件流 `meta → delta* → final → done`
//!
//! 流式请求先建立后端连接，连接或状态码失败直接返回 JSON 错误，不输出任何事件；
//! 连接成功后由 `StreamFramer` 在独立任务中推送事件到有界通道。

use crate::backends::{FragmentStream, GenerateOptions};
use crate::models::{new_request_id, CompletionRequest, CompletionResponse};
use crate::processor::CompletionError;
use crate::prompt::{infer_indent_unit, prime_prefix};
use crate::server::AppState;
use crate::stream::{
    encode_ndjson, encode_sse, FramerOutcome, StreamEvent, StreamFramer, NDJSON_CONTENT_TYPE,
    SSE_CONTENT_TYPE,
};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tokio::sync::mpsc;

/// 事件编码函数
type Encoder = fn(&StreamEvent) -> Option<String>;

fn sse_frame(event: &StreamEvent) -> Option<String> {
    Some(encode_sse(event))
}

/// 已校验并构建好 prompt 的请求
struct PreparedCompletion {
    request_id: String,
    prompt: String,
    options: GenerateOptions,
    prefix: String,
    suffix: String,
}

fn prepare(
    state: &AppState,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<PreparedCompletion, CompletionError> {
    let Json(req) = payload.map_err(|e| CompletionError::Validation(e.body_text()))?;
    req.validate().map_err(CompletionError::Validation)?;

    let request_id = new_request_id();
    let language = req.normalized_language();
    let primed = prime_prefix(&req.prefix);
    let prompt = state.prompt.build(&primed, &req.suffix, &language);

    tracing::info!(
        "[COMPLETE] request_id={} language={} prefix_len={} suffix_len={} max_tokens={} stream={}",
        request_id,
        language,
        req.prefix.len(),
        req.suffix.len(),
        req.max_tokens,
        req.stream
    );
    tracing::debug!(
        "[COMPLETE] request_id={} indent_unit={:?} primed={}",
        request_id,
        infer_indent_unit(&req.prefix),
        primed.len() != req.prefix.len()
    );

    Ok(PreparedCompletion {
        request_id,
        prompt,
        options: req.generate_options(),
        prefix: req.prefix,
        suffix: req.suffix,
    })
}

/// POST /complete
pub async fn complete(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Response {
    let stream = matches!(&payload, Ok(Json(req)) if req.stream);
    let prepared = match prepare(&state, payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("[COMPLETE] 请求被拒绝: {}", e);
            return e.into_response();
        }
    };

    if stream {
        return stream_response(state, prepared, NDJSON_CONTENT_TYPE, encode_ndjson).await;
    }

    let raw = match state
        .backend
        .generate(&prepared.prompt, &prepared.options)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            let err = CompletionError::from(e);
            err.log_with_context(&prepared.request_id);
            return err.into_response();
        }
    };

    let completion = state.postprocessor.process(
        &prepared.prefix,
        &prepared.suffix,
        &raw,
        &prepared.options.stop,
    );
    tracing::info!(
        "[COMPLETE] request_id={} raw_len={} completion_len={}",
        prepared.request_id,
        raw.len(),
        completion.len()
    );

    Json(CompletionResponse {
        request_id: prepared.request_id,
        completion,
    })
    .into_response()
}

/// POST /complete_stream
pub async fn complete_stream(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Response {
    match prepare(&state, payload) {
        Ok(prepared) => stream_response(state, prepared, SSE_CONTENT_TYPE, sse_frame).await,
        Err(e) => {
            tracing::warn!("[COMPLETE] 请求被拒绝: {}", e);
            e.into_response()
        }
    }
}

async fn stream_response(
    state: AppState,
    prepared: PreparedCompletion,
    content_type: &'static str,
    encode: Encoder,
) -> Response {
    let fragments = match state
        .backend
        .generate_stream(&prepared.prompt, &prepared.options)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            let err = CompletionError::from(e);
            err.log_with_context(&prepared.request_id);
            return err.into_response();
        }
    };

    let mut rx = spawn_framer(&state, prepared, fragments);
    let body = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            if let Some(frame) = encode(&event) {
                yield Ok::<Bytes, std::io::Error>(Bytes::from(frame));
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| {
            CompletionError::Internal("Failed to build streaming response".to_string())
                .into_response()
        })
}

/// 在独立任务中驱动帧器，返回事件接收端
///
/// 接收端被丢弃（客户端断开）时帧器停止拉取后端片段。
fn spawn_framer(
    state: &AppState,
    prepared: PreparedCompletion,
    fragments: FragmentStream,
) -> mpsc::Receiver<StreamEvent> {
    let (mut tx, rx) = mpsc::channel(state.config.completion.stream_buffer.max(1));
    let request_id = prepared.request_id;
    let mut framer = StreamFramer::new(
        request_id.clone(),
        prepared.prefix,
        prepared.suffix,
        prepared.options.stop,
        state.postprocessor.clone(),
    );

    tokio::spawn(async move {
        match framer.run(fragments, &mut tx).await {
            FramerOutcome::Completed { completion } => {
                tracing::info!(
                    "[COMPLETE] request_id={} 流式完成 raw_len={} completion_len={}",
                    request_id,
                    framer.raw().len(),
                    completion.len()
                );
            }
            FramerOutcome::Cancelled => {}
            FramerOutcome::BackendFailed(e) => {
                CompletionError::from(e).log_with_context(&request_id);
            }
        }
    });

    rx
}
