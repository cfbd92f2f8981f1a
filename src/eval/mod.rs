//! 批量补全评测
//!
//! 从 JSONL 读取用例 `{id, prefix, suffix, language, note}`，逐条调用 `/complete`，
//! 每条用例产出一行 CSV 记录，并统计成功请求的延迟分位数。

use crate::client::{ClientError, CompletionClient};
use crate::telemetry::interpolated_percentile;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Instant;

/// CSV 列
pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "status",
    "http_status",
    "latency_ms",
    "tokens_out",
    "has_newline",
    "starts_with_space",
    "preview",
    "error",
    "note",
];

const PREVIEW_CHARS: usize = 80;
const ERROR_BODY_CHARS: usize = 200;

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(default)]
    id: Option<Value>,
    prefix: String,
    #[serde(default)]
    suffix: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    note: Option<Value>,
}

/// 一条评测用例
#[derive(Debug, Clone, PartialEq)]
pub struct EvalCase {
    pub id: String,
    pub prefix: String,
    pub suffix: String,
    pub language: String,
    pub note: String,
}

fn value_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// 解析 JSONL 用例
///
/// 空行跳过；无法解析或缺少 `prefix` 的行记一条警告后跳过。
/// 没有 `id` 的用例按解析顺序命名为 `case_<n>`。
pub fn parse_cases(text: &str) -> Vec<EvalCase> {
    let mut cases = Vec::new();
    for (ln, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawCase>(line) {
            Ok(raw) => {
                let index = cases.len() + 1;
                cases.push(EvalCase {
                    id: value_text(raw.id).unwrap_or_else(|| format!("case_{}", index)),
                    prefix: raw.prefix,
                    suffix: raw.suffix,
                    language: raw.language,
                    note: value_text(raw.note).unwrap_or_default(),
                });
            }
            Err(e) => tracing::warn!("[EVAL] 第 {} 行无效: {}", ln + 1, e),
        }
    }
    cases
}

/// 覆盖服务端默认值的请求参数
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// 遇到第一条非成功记录即停止
    pub fail_fast: bool,
}

impl EvalCase {
    pub fn payload(&self, options: &EvalOptions) -> Value {
        let mut payload = Map::new();
        payload.insert("prefix".to_string(), Value::String(self.prefix.clone()));
        payload.insert("suffix".to_string(), Value::String(self.suffix.clone()));
        payload.insert("language".to_string(), Value::String(self.language.clone()));
        if let Some(max_tokens) = options.max_tokens {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        Value::Object(payload)
    }
}

/// 单条用例的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    /// 200
    Ok,
    /// 非 200 状态
    Fail,
    /// 传输层错误，没有状态码
    Error,
}

impl EvalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalStatus::Ok => "ok",
            EvalStatus::Fail => "fail",
            EvalStatus::Error => "error",
        }
    }
}

/// 一行评测记录
#[derive(Debug, Clone)]
pub struct EvalRow {
    pub id: String,
    pub status: EvalStatus,
    pub http_status: Option<u16>,
    pub latency_ms: Option<f64>,
    pub completion: Option<String>,
    pub error: String,
    pub note: String,
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// 换行显示为 `\n`，超过 80 个字符时截断并加省略号
pub fn preview(completion: &str) -> String {
    let escaped = completion.replace('\n', "\\n");
    if escaped.chars().count() > PREVIEW_CHARS {
        format!("{}…", truncate_chars(&escaped, PREVIEW_CHARS))
    } else {
        escaped
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl EvalRow {
    fn failure(case: &EvalCase, latency_ms: f64, err: ClientError) -> Self {
        match err {
            ClientError::Status { status, body } => Self {
                id: case.id.clone(),
                status: EvalStatus::Fail,
                http_status: Some(status),
                latency_ms: Some(latency_ms),
                completion: None,
                error: truncate_chars(&body, ERROR_BODY_CHARS),
                note: case.note.clone(),
            },
            ClientError::RetriesExhausted { last, .. } => Self::failure(case, latency_ms, *last),
            other => Self {
                id: case.id.clone(),
                status: EvalStatus::Error,
                http_status: None,
                latency_ms: None,
                completion: None,
                error: other.to_string(),
                note: case.note.clone(),
            },
        }
    }

    /// 按 `CSV_COLUMNS` 顺序的字段
    pub fn fields(&self) -> Vec<String> {
        let (tokens_out, has_newline, starts_with_space, preview_text) = match &self.completion {
            Some(c) => (
                c.chars().count().to_string(),
                yes_no(c.contains('\n')).to_string(),
                yes_no(c.starts_with([' ', '\t', '\n'])).to_string(),
                preview(c),
            ),
            None => Default::default(),
        };
        vec![
            self.id.clone(),
            self.status.as_str().to_string(),
            self.http_status.map(|s| s.to_string()).unwrap_or_default(),
            self.latency_ms
                .map(|ms| format!("{:.2}", ms))
                .unwrap_or_default(),
            tokens_out,
            has_newline,
            starts_with_space,
            preview_text,
            self.error.clone(),
            self.note.clone(),
        ]
    }
}

/// 一次评测的全部记录
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    pub rows: Vec<EvalRow>,
}

impl EvalReport {
    pub fn ok_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == EvalStatus::Ok)
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.rows.len() - self.ok_count()
    }

    /// 成功请求的延迟（毫秒）
    pub fn ok_latencies(&self) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|r| r.status == EvalStatus::Ok)
            .filter_map(|r| r.latency_ms)
            .collect()
    }

    /// 成功请求的 p50/p95/p99；没有成功请求时返回 `None`
    pub fn latency_percentiles(&self) -> Option<(f64, f64, f64)> {
        let latencies = self.ok_latencies();
        if latencies.is_empty() {
            return None;
        }
        Some((
            interpolated_percentile(&latencies, 0.50),
            interpolated_percentile(&latencies, 0.95),
            interpolated_percentile(&latencies, 0.99),
        ))
    }

    pub fn to_csv(&self) -> String {
        let mut csv = CSV_COLUMNS.join(",");
        csv.push('\n');
        for row in &self.rows {
            let line: Vec<String> = row.fields().iter().map(|f| escape_csv_field(f)).collect();
            csv.push_str(&line.join(","));
            csv.push('\n');
        }
        csv
    }
}

/// 逐条执行用例
pub async fn run_eval(
    client: &CompletionClient,
    cases: &[EvalCase],
    options: &EvalOptions,
) -> EvalReport {
    let mut report = EvalReport::default();

    for case in cases {
        let started = Instant::now();
        let result = client.complete(&case.payload(options)).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let row = match result {
            Ok(completion) => EvalRow {
                id: case.id.clone(),
                status: EvalStatus::Ok,
                http_status: Some(200),
                latency_ms: Some(latency_ms),
                completion: Some(completion),
                error: String::new(),
                note: case.note.clone(),
            },
            Err(e) => EvalRow::failure(case, latency_ms, e),
        };
        tracing::info!(
            "[EVAL] {} {} {:.2}ms",
            row.id,
            row.status.as_str(),
            latency_ms
        );

        let stop = options.fail_fast && row.status != EvalStatus::Ok;
        report.rows.push(row);
        if stop {
            break;
        }
    }
    report
}
