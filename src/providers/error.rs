//! 统一的 Provider 错误类型
//!
//! 区分可重试和不可重试错误，并提供中文错误信息。

use crate::streaming::StreamError;
use thiserror::Error;

/// Provider 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// 网络错误（可重试）
    /// 包括连接超时、DNS 解析失败等
    #[error("网络连接失败，请检查网络设置后重试。详情：{0}")]
    NetworkError(String),

    /// 认证错误
    /// API key 无效或没有权限
    #[error("认证失败，请检查 API key。详情：{0}")]
    AuthenticationError(String),

    /// 配置错误
    /// 缺少 API key、base_url 非法等
    #[error("配置错误，请检查服务端配置。详情：{0}")]
    ConfigurationError(String),

    /// 限流错误（需要等待）
    #[error("请求过于频繁，请稍后重试。详情：{0}")]
    RateLimitError(String),

    /// 服务器错误（临时问题，可重试）
    #[error("服务器暂时不可用，请稍后重试。详情：{0}")]
    ServerError(String),

    /// 请求错误（不可重试）
    /// 4xx 错误（除认证和限流外）
    #[error("请求失败。详情：{0}")]
    RequestError(String),

    /// 解析错误（不可重试）
    #[error("数据解析失败。详情：{0}")]
    ParseError(String),

    /// 未知错误
    #[error("发生未知错误。详情：{0}")]
    Unknown(String),
}

impl ProviderError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::NetworkError(_)
                | ProviderError::ServerError(_)
                | ProviderError::RateLimitError(_)
        )
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::NetworkError(_) => "NetworkError",
            ProviderError::AuthenticationError(_) => "AuthenticationError",
            ProviderError::ConfigurationError(_) => "ConfigurationError",
            ProviderError::RateLimitError(_) => "RateLimitError",
            ProviderError::ServerError(_) => "ServerError",
            ProviderError::RequestError(_) => "RequestError",
            ProviderError::ParseError(_) => "ParseError",
            ProviderError::Unknown(_) => "Unknown",
        }
    }

    /// 从 HTTP 状态码创建错误
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {} - {}", status, truncate_message(body, 200));
        match status {
            401 | 403 => ProviderError::AuthenticationError(detail),
            429 => ProviderError::RateLimitError(detail),
            400 | 404 | 405 | 422 => ProviderError::RequestError(detail),
            500..=599 => ProviderError::ServerError(detail),
            _ => ProviderError::Unknown(detail),
        }
    }

    /// 从 reqwest 错误创建
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::NetworkError("请求超时".to_string())
        } else if err.is_connect() {
            ProviderError::NetworkError("无法连接到服务器".to_string())
        } else if err.is_builder() {
            ProviderError::ConfigurationError(err.to_string())
        } else if err.is_decode() {
            ProviderError::ParseError("响应解码失败".to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_http_status(status.as_u16(), &err.to_string())
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }

    /// 转换为流式错误（用于在流中上报）
    pub fn to_stream_error(&self) -> StreamError {
        match self {
            ProviderError::NetworkError(msg) => StreamError::Network(msg.clone()),
            ProviderError::ParseError(msg) => StreamError::ParseError(msg.clone()),
            ProviderError::ConfigurationError(msg) => StreamError::Internal(msg.clone()),
            ProviderError::AuthenticationError(msg) => StreamError::provider_error(401, msg.clone()),
            ProviderError::RateLimitError(msg) => StreamError::provider_error(429, msg.clone()),
            ProviderError::RequestError(msg) => StreamError::provider_error(400, msg.clone()),
            ProviderError::ServerError(msg) => StreamError::provider_error(502, msg.clone()),
            ProviderError::Unknown(msg) => StreamError::Internal(msg.clone()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::from_reqwest_error(&err)
    }
}

/// 截断消息到指定字符数
fn truncate_message(msg: &str, max_chars: usize) -> String {
    match msg.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &msg[..idx]),
        None => msg.to_string(),
    }
}

// ============================================================================
// 测试模块
// ============================================================================
