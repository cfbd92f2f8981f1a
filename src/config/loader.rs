//! 配置加载
//!
//! 顺序：默认值 → YAML 文件（可选）→ 环境变量覆盖 → 校验

use super::types::Config;
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置文件失败: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("配置无效: {0}")]
    Invalid(String),
}

impl Config {
    /// 从 YAML 字符串解析
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// 加载配置：文件（可选）+ 进程环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_yaml_str(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 便于测试时注入，不直接读取进程环境
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OLLAMA_URL") {
            self.backend.url = v;
        }
        if let Some(v) = lookup("MODEL") {
            self.backend.model = v;
        }
        if let Some(v) = lookup("API_KEY") {
            self.auth.api_key = v;
        }
        if let Some(v) = lookup("TIMEOUT_SECONDS") {
            self.backend.timeout_secs = parse_value("TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("ALLOW_ORIGINS") {
            self.server.allow_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = lookup("POSTPROCESS_ENABLED") {
            self.completion.postprocess_enabled = parse_bool("POSTPROCESS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("CODECAST_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("CODECAST_PORT") {
            self.server.port = parse_value("CODECAST_PORT", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.url 不能为空".to_string()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.timeout_secs 必须大于 0".to_string(),
            ));
        }
        if self.completion.stream_buffer == 0 {
            return Err(ConfigError::Invalid(
                "completion.stream_buffer 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}={value} 不是有效的值")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{key}={value} 不是有效的布尔值"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://127.0.0.1:11434");
        assert_eq!(config.backend.model, "qwen2.5-coder:7b");
        assert_eq!(config.backend.timeout_secs, 120);
        assert!(config.completion.postprocess_enabled);
        assert_eq!(config.completion.dedupe_window, 120);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "backend:\n  model: codellama:7b\nauth:\n  api_key: secret\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.backend.model, "codellama:7b");
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.auth.api_key, "secret");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("OLLAMA_URL", "http://gpu:11434/api/generate"),
                ("TIMEOUT_SECONDS", "30"),
                ("ALLOW_ORIGINS", "http://a.com, http://b.com"),
                ("POSTPROCESS_ENABLED", "false"),
                ("CODECAST_PORT", "9100"),
            ]))
            .unwrap();
        assert_eq!(config.backend.url, "http://gpu:11434/api/generate");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(
            config.server.allow_origins,
            vec!["http://a.com".to_string(), "http://b.com".to_string()]
        );
        assert!(!config.completion.postprocess_enabled);
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(env(&[("TIMEOUT_SECONDS", "soon")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.backend.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 9200\ncompletion:\n  dedupe_window: 64").unwrap();
        let config = Config::from_yaml_str(&std::fs::read_to_string(file.path()).unwrap())
            .unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.completion.dedupe_window, 64);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml_str("server: [unclosed");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
