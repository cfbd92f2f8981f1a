//! 配置类型定义

use serde::{Deserialize, Serialize};

/// 全局配置
///
/// 启动时构建一次，之后以 `Arc<Config>` 只读传递
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听配置
    pub server: ServerConfig,
    /// 推理后端配置
    pub backend: BackendConfig,
    /// 认证配置
    pub auth: AuthConfig,
    /// 补全行为配置
    pub completion: CompletionSettings,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 监听配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的 CORS 来源，`*` 表示任意
    pub allow_origins: Vec<String>,
    /// 请求体上限（字节）
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            allow_origins: vec!["*".to_string()],
            body_limit: 1024 * 1024,
        }
    }
}

/// 推理后端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 后端地址，可以是根地址或完整的 `/api/generate` 端点
    pub url: String,
    /// 模型名称
    pub model: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 上下文长度
    pub num_ctx: u32,
    /// 重复惩罚
    pub repeat_penalty: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            timeout_secs: 120,
            num_ctx: 2048,
            repeat_penalty: 1.1,
        }
    }
}

/// 认证配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 期望的 Bearer token，为空时不校验
    pub api_key: String,
}

/// 补全行为配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// 是否启用后处理管道
    pub postprocess_enabled: bool,
    /// 重叠去重窗口（字符数）
    pub dedupe_window: usize,
    /// 流式事件通道容量
    pub stream_buffer: usize,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            postprocess_enabled: true,
            dedupe_window: 120,
            stream_buffer: 32,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先）
    pub level: String,
    /// `pretty` 或 `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
