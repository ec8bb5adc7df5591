//! 配置类型定义
//!
//! 所有段落都带 `#[serde(default)]`，YAML 中省略的字段使用默认值。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// 默认端口
pub const DEFAULT_PORT: u16 = 8787;
/// 默认流式路由
pub const DEFAULT_ROUTE: &str = "/sapopinguino-stream";
/// 默认 OpenAI base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
/// 默认输入字符上限
pub const DEFAULT_INPUT_LIMIT: usize = 1000;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    /// 服务器配置
    pub server: ServerConfig,
    /// 上游 Provider 配置
    pub provider: ProviderConfig,
    /// 流式处理配置
    pub stream: StreamConfig,
    /// 客户端配置
    pub client: ClientConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

// ============================================================================
// 服务器
// ============================================================================

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 流式翻译路由
    pub route: String,
    /// CORS 允许的客户端来源，未配置时为 `*`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_origin: Option<String>,
    /// 请求体大小上限（字节）
    pub max_body_bytes: usize,
    /// `message` 字段的最大字符数，未配置时不限制
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_chars: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            route: DEFAULT_ROUTE.to_string(),
            client_origin: None,
            max_body_bytes: 64 * 1024,
            max_message_chars: None,
        }
    }
}

impl ServerConfig {
    /// 监听地址字符串 `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// CORS allow-origin 的值
    pub fn allow_origin(&self) -> &str {
        self.client_origin
            .as_deref()
            .filter(|origin| !origin.is_empty())
            .unwrap_or("*")
    }
}

// ============================================================================
// Provider
// ============================================================================

/// 上游 Provider 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key（通常由 OPENAI_API_KEY 提供）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL，带不带 `/v1` 均可
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// 存储 prompt 的 id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    /// 存储 prompt 的版本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
    /// 模型名（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// 连接超时（毫秒）
    pub connect_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            prompt_id: None,
            prompt_version: None,
            model: None,
            connect_timeout_ms: 10_000,
        }
    }
}

// ============================================================================
// 流式处理
// ============================================================================

/// 流式处理配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    /// SSE 缓冲区上限（字节）
    pub max_buffer_bytes: usize,
    /// 上游两个 chunk 之间的最长等待（毫秒），0 表示不限制
    pub idle_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 1024 * 1024,
            idle_timeout_ms: 0,
        }
    }
}

impl StreamConfig {
    /// 空闲超时，未启用时为 None
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

// ============================================================================
// 客户端
// ============================================================================

/// 转换模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransformationMode {
    /// 结构化 Token（单词 + 转写）
    #[default]
    Respell,
    /// 纯文本翻译，每行作为一个字面量
    Translate,
}

impl TransformationMode {
    /// 路由后缀
    pub fn route_suffix(&self) -> &'static str {
        match self {
            TransformationMode::Respell => "",
            TransformationMode::Translate => "-translate",
        }
    }
}

/// 响应分帧方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    /// 根据 Content-Type 自动选择
    #[default]
    Auto,
    /// 逐行
    Lines,
    /// SSE 记录
    Sse,
}

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// 服务端 base URL，如 `http://127.0.0.1:8787`
    pub endpoint: String,
    /// 流式路由
    pub route: String,
    /// 转换模式
    pub mode: TransformationMode,
    /// 分帧方式
    pub framing: FramingMode,
    /// 源语言
    pub source_language: String,
    /// 目标语言
    pub target_language: String,
    /// 连接超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 输入文本的最大字符数，0 表示不限制
    pub input_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("http://{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            route: DEFAULT_ROUTE.to_string(),
            mode: TransformationMode::default(),
            framing: FramingMode::default(),
            source_language: "Auto-detect".to_string(),
            target_language: "English".to_string(),
            connect_timeout_ms: 10_000,
            input_limit: DEFAULT_INPUT_LIMIT,
        }
    }
}

impl ClientConfig {
    /// 根据模式拼接完整的请求 URL
    pub fn stream_url(&self) -> String {
        format!(
            "{}{}{}",
            self.endpoint.trim_end_matches('/'),
            self.route,
            self.mode.route_suffix()
        )
    }

    /// 输入是否在字符上限内
    pub fn accepts_input(&self, input: &str) -> bool {
        self.input_limit == 0 || input.chars().count() <= self.input_limit
    }
}

// ============================================================================
// 日志
// ============================================================================

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认日志级别（RUST_LOG 优先）
    pub level: String,
    /// 是否输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind_address(), "127.0.0.1:8787");
        assert_eq!(config.server.route, "/sapopinguino-stream");
        assert_eq!(config.server.allow_origin(), "*");
        assert_eq!(config.server.max_body_bytes, 65536);
        assert_eq!(config.provider.connect_timeout_ms, 10_000);
        assert_eq!(config.stream.max_buffer_bytes, 1024 * 1024);
        assert!(config.stream.idle_timeout().is_none());
        assert_eq!(config.client.source_language, "Auto-detect");
        assert_eq!(config.client.target_language, "English");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_allow_origin() {
        let mut server = ServerConfig {
            client_origin: Some("https://app.example".to_string()),
            ..ServerConfig::default()
        };
        assert_eq!(server.allow_origin(), "https://app.example");

        server.client_origin = Some(String::new());
        assert_eq!(server.allow_origin(), "*");
    }

    #[test]
    fn test_idle_timeout() {
        let config = StreamConfig {
            idle_timeout_ms: 1500,
            ..StreamConfig::default()
        };
        assert_eq!(config.idle_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_stream_url_by_mode() {
        let mut client = ClientConfig {
            endpoint: "https://api.example/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(client.stream_url(), "https://api.example/sapopinguino-stream");

        client.mode = TransformationMode::Translate;
        assert_eq!(
            client.stream_url(),
            "https://api.example/sapopinguino-stream-translate"
        );
    }

    #[test]
    fn test_input_limit_counts_chars() {
        let mut client = ClientConfig {
            input_limit: 4,
            ..ClientConfig::default()
        };
        assert!(client.accepts_input("niño"));
        assert!(!client.accepts_input("niños"));

        client.input_limit = 0;
        assert!(client.accepts_input(&"a".repeat(5000)));
        assert_eq!(ClientConfig::default().input_limit, DEFAULT_INPUT_LIMIT);
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&TransformationMode::Translate).unwrap(),
            "\"translate\""
        );
        assert_eq!(serde_json::to_string(&FramingMode::Sse).unwrap(), "\"sse\"");
    }
}
