//! 翻译流错误
//!
//! 客户端只会看到一个错误标记；这里的分类用于日志字段和指标中的 outcome。

use thiserror::Error;

/// 翻译流失败原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// 上游连接失败或响应体读取中断
    #[error("网络错误: {0}")]
    Network(String),

    /// 超过 `idle_timeout_ms` 没有收到上游 chunk
    #[error("上游空闲超时")]
    Timeout,

    /// 上游响应无法解码
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 上游返回错误状态，或在流中发送了错误事件（此时 status 为 200）
    #[error("Provider 错误 ({status}): {message}")]
    ProviderError { status: u16, message: String },

    /// SSE 缓冲区超过 `max_buffer_bytes` 仍未出现记录分隔符
    #[error("SSE 缓冲区溢出")]
    BufferOverflow,

    /// 服务端配置问题（如缺少 API key）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Timeout
        } else if err.is_connect() {
            StreamError::Network(format!("连接失败: {}", err))
        } else if err.is_body() || err.is_decode() {
            StreamError::Network(format!("响应体读取失败: {}", err))
        } else {
            StreamError::Network(err.to_string())
        }
    }
}

impl StreamError {
    pub fn provider_error(status: u16, message: impl Into<String>) -> Self {
        StreamError::ProviderError {
            status,
            message: message.into(),
        }
    }

    /// 客户端重发同一请求是否可能成功
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Network(_) | StreamError::Timeout => true,
            StreamError::ProviderError { status, .. } => *status == 429 || *status >= 500,
            StreamError::ParseError(_) | StreamError::BufferOverflow | StreamError::Internal(_) => {
                false
            }
        }
    }

    /// 对应的上游 HTTP 状态码
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StreamError::ProviderError { status, .. } => Some(*status),
            StreamError::Timeout => Some(504),
            StreamError::Network(_) => Some(502),
            _ => None,
        }
    }

    /// 日志和指标使用的错误类型
    pub fn error_type(&self) -> &'static str {
        match self {
            StreamError::Network(_) => "network_error",
            StreamError::Timeout => "timeout",
            StreamError::ParseError(_) => "parse_error",
            StreamError::ProviderError { .. } => "provider_error",
            StreamError::BufferOverflow => "buffer_overflow",
            StreamError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_event_is_not_retryable() {
        // 流内错误事件携带 200，不应提示重试
        let err = StreamError::provider_error(200, "model overloaded");
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), Some(200));
        assert_eq!(err.to_string(), "Provider 错误 (200): model overloaded");
    }

    #[test]
    fn test_retryable_classification() {
        let cases = [
            (StreamError::Network("reset".into()), true),
            (StreamError::Timeout, true),
            (StreamError::provider_error(429, "slow down"), true),
            (StreamError::provider_error(502, "bad gateway"), true),
            (StreamError::provider_error(401, "bad key"), false),
            (StreamError::BufferOverflow, false),
            (StreamError::Internal("no key".into()), false),
        ];
        for (err, retryable) in cases {
            assert_eq!(err.is_retryable(), retryable, "{err:?}");
        }
    }

    #[test]
    fn test_status_code_for_transport_failures() {
        assert_eq!(StreamError::Timeout.status_code(), Some(504));
        assert_eq!(StreamError::Network("x".into()).status_code(), Some(502));
        assert_eq!(StreamError::BufferOverflow.status_code(), None);
        assert_eq!(StreamError::Internal("x".into()).status_code(), None);
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(StreamError::BufferOverflow.error_type(), "buffer_overflow");
        assert_eq!(StreamError::Timeout.error_type(), "timeout");
        assert_eq!(
            StreamError::provider_error(500, "x").error_type(),
            "provider_error"
        );
    }
}
