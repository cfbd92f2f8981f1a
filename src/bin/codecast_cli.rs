//! codecast 调试客户端
//!
//! 从 stdin（或 `--file`）读取 prefix，调用 `/complete` 或流式接口并打印结果。
//! `bridge` 子命令把 stdin 的 JSON 行请求转发给服务端，结果逐行写到 stdout，供编辑器插件调用。
//! `eval` 子命令批量跑 JSONL 用例，结果写成 CSV。

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use codecast_lib::client::{
    parse_extra_header, strip_md_fence, ClientConfig, CompletionClient, Transport,
};
use codecast_lib::eval::{parse_cases, run_eval, EvalOptions};
use codecast_lib::logger::sanitize_log_message;
use codecast_lib::resilience::RetryConfig;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// 读取 prefix，调用补全接口并打印结果
#[derive(Parser, Debug)]
#[command(name = "codecast-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// JSON 行桥接：stdin `{id, action, payload}` → stdout `{id, ok, ...}`
    Bridge,
    /// 批量评测：JSONL 用例 → CSV
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// 用例文件，每行 `{id, prefix, suffix, language, note}`
    #[arg(long)]
    input: PathBuf,

    /// 结果 CSV 路径
    #[arg(long)]
    out: PathBuf,

    /// 覆盖服务端默认的 max_tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// 覆盖服务端默认的 temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// 第一条失败后停止
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// 服务地址
    #[arg(long, env = "SERVER_URL", default_value = "http://127.0.0.1:9000")]
    server: String,

    /// Bearer token
    #[arg(long, env = "API_KEY", default_value = "")]
    api_key: String,

    /// 请求超时（秒）
    #[arg(long, default_value_t = 600.0)]
    timeout: f64,

    /// 非流式请求的重试次数
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// 首次重试前的等待（秒），之后按指数增长
    #[arg(long, default_value_t = 0.5)]
    retry_wait: f64,

    /// 附加请求头，格式 `Key: Value`，可重复
    #[arg(long = "extra-header")]
    extra_headers: Vec<String>,

    /// 在 stderr 打印请求详情
    #[arg(long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RequestArgs {
    #[arg(long, default_value = "python")]
    language: String,

    /// 光标后的代码
    #[arg(long, default_value = "\n")]
    suffix: String,

    /// 从文件读取 suffix，优先于 `--suffix`
    #[arg(long)]
    suffix_file: Option<PathBuf>,

    #[arg(long, default_value_t = 64)]
    max_tokens: u32,

    /// 采样温度，不指定时使用服务端默认值
    #[arg(long)]
    temp: Option<f32>,

    /// 流式打印片段
    #[arg(long)]
    stream: bool,

    /// 去掉输出中的 Markdown 代码围栏（仅非流式）
    #[arg(long)]
    strip_fence: bool,

    /// 从文件读取 prefix，不指定时读取 stdin
    #[arg(long)]
    file: Option<PathBuf>,
}

fn init_cli_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 秒数转 `Duration`，负数、NaN 或溢出时报错
fn seconds(flag: &str, value: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) => Ok(d),
        Err(e) => anyhow::bail!("{} {} 无效: {}", flag, value, e),
    }
}

fn build_client(args: &ConnectionArgs) -> anyhow::Result<CompletionClient> {
    let extra_headers = args
        .extra_headers
        .iter()
        .map(|raw| parse_extra_header(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = ClientConfig {
        server: args.server.clone(),
        api_key: args.api_key.clone(),
        timeout: seconds("--timeout", args.timeout)?,
        extra_headers,
        retry: RetryConfig::new(
            args.retries,
            seconds("--retry-wait", args.retry_wait)?,
            RetryConfig::default().max_delay,
        ),
    };
    Ok(CompletionClient::new(config)?)
}

fn build_payload(request: &RequestArgs, prefix: String, suffix: String) -> Value {
    let mut payload = Map::new();
    payload.insert("prefix".to_string(), Value::String(prefix));
    payload.insert("suffix".to_string(), Value::String(suffix));
    payload.insert("language".to_string(), Value::String(request.language.clone()));
    payload.insert("max_tokens".to_string(), json!(request.max_tokens));
    if let Some(temp) = request.temp {
        payload.insert("temperature".to_string(), json!(temp));
    }
    Value::Object(payload)
}

async fn run_complete(cli: &Cli) -> anyhow::Result<()> {
    let request = &cli.request;
    let prefix = match &request.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("读取 {} 失败", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if prefix.is_empty() {
        anyhow::bail!(
            "prefix 为空。示例:\n  printf 'def add(a, b):\\n    ' | codecast-cli --server http://host:9000 --api-key TOKEN"
        );
    }
    let suffix = match &request.suffix_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("读取 {} 失败", path.display()))?,
        None => request.suffix.clone(),
    };

    let payload = build_payload(request, prefix, suffix);
    if cli.connection.verbose {
        eprintln!("[payload] {}", payload);
        if !cli.connection.api_key.is_empty() {
            eprintln!(
                "[headers] {}",
                sanitize_log_message(&format!("Authorization: Bearer {}", cli.connection.api_key))
            );
        }
    }

    let client = build_client(&cli.connection)?;
    if request.stream {
        let mut stream = client.stream(&payload).await?;
        if cli.connection.verbose && stream.transport == Transport::JsonLines {
            eprintln!("[transport] /complete_stream 不可用，已回退到 NDJSON");
        }
        let mut stdout = std::io::stdout();
        while let Some(fragment) = stream.fragments.next().await {
            write!(stdout, "{}", fragment?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let mut out = client.complete(&payload).await?;
        if request.strip_fence {
            out = strip_md_fence(&out);
        }
        print!("{}", out);
        std::io::stdout().flush()?;
    }
    Ok(())
}

fn unix_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// 处理一行桥接请求，空行返回 `None`
async fn handle_bridge_line(client: &CompletionClient, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("[BRIDGE] 无效的 JSON 行: {:?} err={}", line, e);
            return Some(json!({ "ok": false, "error": format!("bad json: {}", e) }));
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let action = request.get("action").and_then(|a| a.as_str()).unwrap_or_default();
    let response = match action {
        "ping" => json!({ "id": id, "ok": true, "pong": true, "ts": unix_ts() }),
        "complete" => {
            let payload = request.get("payload").cloned().unwrap_or_else(|| json!({}));
            match client.complete(&payload).await {
                Ok(completion) => json!({ "id": id, "ok": true, "completion": completion }),
                Err(e) => {
                    tracing::warn!("[BRIDGE] 补全失败: {}", e);
                    json!({ "id": id, "ok": false, "error": e.to_string() })
                }
            }
        }
        other => json!({ "id": id, "ok": false, "error": format!("unknown action: {}", other) }),
    };
    Some(response)
}

async fn run_bridge(connection: &ConnectionArgs) -> anyhow::Result<()> {
    let client = build_client(connection)?;
    tracing::info!(
        "[BRIDGE] start server={} api_key={} timeout={}s",
        client.base_url(),
        if connection.api_key.is_empty() { "empty" } else { "set" },
        connection.timeout
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if let Some(response) = handle_bridge_line(&client, &line).await {
            writeln!(stdout, "{}", response)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// 返回是否全部成功
async fn run_eval_command(connection: &ConnectionArgs, args: &EvalArgs) -> anyhow::Result<bool> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("读取 {} 失败", args.input.display()))?;
    let cases = parse_cases(&text);
    let client = build_client(connection)?;
    let options = EvalOptions {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        fail_fast: args.fail_fast,
    };

    let report = run_eval(&client, &cases, &options).await;
    std::fs::write(&args.out, report.to_csv())
        .with_context(|| format!("写入 {} 失败", args.out.display()))?;

    println!("\n=== Summary ===");
    println!(
        "Total: {} | OK: {} | Fail: {}",
        report.rows.len(),
        report.ok_count(),
        report.fail_count()
    );
    if let Some((p50, p95, p99)) = report.latency_percentiles() {
        println!(
            "Latency ms (ok only): p50={:.2}  p95={:.2}  p99={:.2}",
            p50, p95, p99
        );
    }
    println!("CSV saved to: {}", args.out.display());
    Ok(report.fail_count() == 0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_logging(cli.connection.verbose);

    match &cli.command {
        Some(Command::Bridge) => run_bridge(&cli.connection).await,
        Some(Command::Eval(args)) => {
            if !run_eval_command(&cli.connection, args).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        None => run_complete(&cli).await,
    }
}
