//! codecast 服务入口

use anyhow::Context;
use clap::Parser;
use codecast_lib::backends::OllamaBackend;
use codecast_lib::logger::init_logging;
use codecast_lib::{build_router, AppState, Config};
use std::path::PathBuf;
use std::sync::Arc;

/// 代码补全网关
#[derive(Parser, Debug)]
#[command(name = "codecast")]
#[command(version, about, long_about = None)]
struct Args {
    /// YAML 配置文件路径（环境变量覆盖文件中的值）
    #[arg(short, long, env = "CODECAST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("加载配置失败")?;
    init_logging(&config.logging)?;

    let backend = OllamaBackend::new(&config.backend).context("创建后端客户端失败")?;
    tracing::info!(
        "[SERVER] 后端 {} model={} timeout={}s",
        backend.base_url(),
        config.backend.model,
        config.backend.timeout_secs
    );

    let addr = config.bind_addr();
    let state = AppState::new(config, Arc::new(backend));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定 {} 失败", addr))?;
    tracing::info!("[SERVER] 监听 {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("[SERVER] 收到退出信号");
        })
        .await?;
    Ok(())
}
