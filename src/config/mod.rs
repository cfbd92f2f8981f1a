//! 配置管理模块
//!
//! 提供 YAML 配置文件支持和环境变量覆盖。
//! 配置在启动时构建一次，之后只读，显式传入各组件。

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{
    AuthConfig, BackendConfig, CompletionSettings, Config, LoggingConfig, ServerConfig,
};
