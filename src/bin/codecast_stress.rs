//! codecast 压测工具
//!
//! 固定并发发出固定数量的请求，结束后在 stdout 输出一份 JSON 汇总。

use anyhow::Context;
use clap::Parser;
use codecast_lib::loadgen::{load_payload, HttpTarget, LoadGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// 对补全接口做固定并发压测
#[derive(Parser, Debug)]
#[command(name = "codecast-stress")]
#[command(version, about, long_about = None)]
struct Args {
    /// 服务地址
    #[arg(long, env = "SERVER_URL", default_value = "http://127.0.0.1:9000")]
    server: String,

    /// 压测的接口路径
    #[arg(long, default_value = "/complete")]
    endpoint: String,

    /// Bearer token
    #[arg(long, env = "API_KEY", default_value = "")]
    api_key: String,

    /// 同时在途的请求数
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// 总请求数
    #[arg(long, default_value_t = 100)]
    requests: usize,

    /// 单个请求超时（秒）
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// 覆盖默认 payload 的 JSON 文件
    #[arg(long)]
    payload_file: Option<PathBuf>,
}

/// 秒数转 `Duration`，负数、NaN 或溢出时报错
fn seconds(flag: &str, value: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) => Ok(d),
        Err(e) => anyhow::bail!("{} {} 无效: {}", flag, value, e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let timeout = seconds("--timeout", args.timeout)?;
    let payload = load_payload(args.payload_file.as_deref()).context("加载 payload 失败")?;
    let target = HttpTarget::new(&args.server, &args.endpoint, &args.api_key, timeout, payload)?;
    tracing::info!("[STRESS] 目标 {}", target.url());

    let generator = LoadGenerator::new(args.concurrency, args.requests)?;
    let report = generator.run(Arc::new(target)).await;
    let summary = report.summarize(&args.server, &args.endpoint, args.timeout);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["codecast-stress"]).unwrap();
        assert_eq!(args.endpoint, "/complete");
        assert_eq!(args.concurrency, 10);
        assert_eq!(args.requests, 100);
        assert_eq!(args.timeout, 10.0);
        assert!(args.payload_file.is_none());
    }

    #[test]
    fn test_timeout_out_of_range_is_rejected() {
        assert_eq!(seconds("--timeout", 2.5).unwrap(), Duration::from_millis(2500));
        for bad in [f64::INFINITY, 1e30, -1.0, f64::NAN] {
            assert!(seconds("--timeout", bad).is_err(), "{bad}");
        }
    }
}
