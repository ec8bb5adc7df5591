//! YAML 配置加载
//!
//! 加载顺序：YAML 文件（不存在时使用默认值）-> 环境变量覆盖 -> 校验。

use super::types::Config;
use std::path::Path;
use thiserror::Error;

/// API key
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// 存储 prompt id
pub const ENV_PROMPT_ID: &str = "OPENAI_SAPOPINGUINO_PROMPT_ID";
/// 存储 prompt 版本
pub const ENV_PROMPT_VERSION: &str = "OPENAI_SAPOPINGUINO_PROMPT_VERSION";
/// CORS 客户端来源
pub const ENV_CLIENT_ORIGIN: &str = "CLIENT_ORIGIN";
/// 监听地址
pub const ENV_HOST: &str = "SAPOPINGUINO_HOST";
/// 监听端口
pub const ENV_PORT: &str = "SAPOPINGUINO_PORT";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 文件读写错误
    #[error("配置文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    /// YAML 解析错误
    #[error("YAML 解析失败: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 配置值不合法
    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 从 YAML 文本解析配置（不应用环境变量，不校验）
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// 从文件加载配置
///
/// 文件不存在时使用默认值。之后应用进程环境变量并校验。
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// 从文件加载配置，使用给定的环境变量来源
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("[CONFIG] 读取配置文件: {}", path.display());
        parse_config(&content)?
    } else {
        tracing::info!("[CONFIG] 配置文件不存在，使用默认配置: {}", path.display());
        Config::default()
    };

    config.apply_env_overrides(env)?;
    config.validate()?;
    Ok(config)
}

/// 保存配置到文件
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

impl Config {
    /// 应用环境变量覆盖
    ///
    /// 空字符串视为未设置。
    pub fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|value| !value.is_empty());

        if let Some(api_key) = get(ENV_API_KEY) {
            self.provider.api_key = Some(api_key);
        }
        if let Some(prompt_id) = get(ENV_PROMPT_ID) {
            self.provider.prompt_id = Some(prompt_id);
        }
        if let Some(prompt_version) = get(ENV_PROMPT_VERSION) {
            self.provider.prompt_version = Some(prompt_version);
        }
        if let Some(origin) = get(ENV_CLIENT_ORIGIN) {
            self.server.client_origin = Some(origin);
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.server.port = port.parse().map_err(|_| {
                ConfigError::Invalid(format!("{} 不是合法端口: {}", ENV_PORT, port))
            })?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_route("server.route", &self.server.route)?;
        validate_route("client.route", &self.client.route)?;

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port 不能为 0".to_string()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes 必须大于 0".to_string(),
            ));
        }
        if self.stream.max_buffer_bytes == 0 {
            return Err(ConfigError::Invalid(
                "stream.max_buffer_bytes 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_route(field: &str, route: &str) -> Result<(), ConfigError> {
    if route.is_empty() {
        return Err(ConfigError::Invalid(format!("{} 不能为空", field)));
    }
    if !route.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "{} 必须以 / 开头: {}",
            field, route
        )));
    }
    Ok(())
}

// ============================================================================
// 测试模块
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FramingMode, TransformationMode};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_parse_partial_yaml() {
        let config = parse_config(
            r#"
server:
  port: 9000
client:
  mode: translate
  framing: sse
stream:
  idle_timeout_ms: 30000
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.client.mode, TransformationMode::Translate);
        assert_eq!(config.client.framing, FramingMode::Sse);
        assert_eq!(config.stream.idle_timeout_ms, 30000);
        assert_eq!(config.stream.max_buffer_bytes, 1024 * 1024);
    }

    #[test]
    fn test_parse_empty_yaml() {
        assert_eq!(parse_config("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = parse_config("server: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_with_env(&dir.path().join("absent.yaml"), |_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "provider:\n  prompt_id: from-file\n").unwrap();

        let config = load_config_with_env(
            &path,
            env_from(&[
                (ENV_API_KEY, "sk-test"),
                (ENV_PROMPT_VERSION, "7"),
                (ENV_CLIENT_ORIGIN, "https://app.example"),
                (ENV_HOST, "0.0.0.0"),
                (ENV_PORT, "9999"),
            ]),
        )
        .unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.prompt_id.as_deref(), Some("from-file"));
        assert_eq!(config.provider.prompt_version.as_deref(), Some("7"));
        assert_eq!(config.server.allow_origin(), "https://app.example");
        assert_eq!(config.server.bind_address(), "0.0.0.0:9999");
    }

    #[test]
    fn test_empty_env_value_ignored() {
        let mut config = Config::default();
        config.provider.api_key = Some("from-file".to_string());
        config
            .apply_env_overrides(env_from(&[(ENV_API_KEY, "")]))
            .unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env_from(&[(ENV_PORT, "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.route = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.route = "no-slash".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_body_bytes = 0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.server.port = 8080;
        config.client.mode = TransformationMode::Translate;
        save_config(&path, &config).unwrap();

        let reloaded = load_config_with_env(&path, |_| None).unwrap();
        assert_eq!(reloaded, config);
    }
}
