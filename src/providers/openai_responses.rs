//! OpenAI Responses Provider
//!
//! 以存储的 prompt 调用 `POST {base_url}/v1/responses`，返回 SSE 原始字节流。

use crate::config::{ProviderConfig, DEFAULT_BASE_URL};
use crate::providers::ProviderError;
use crate::streaming::traits::{
    reqwest_stream_to_stream_response, CompletionProvider, StreamResponse,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// 存储 prompt 的引用
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptReference {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Responses API 流式请求体
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponsesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub input: String,
    pub stream: bool,
}

pub struct OpenAIResponsesProvider {
    pub config: ProviderConfig,
    pub client: Client,
}

impl OpenAIResponsesProvider {
    /// 使用 Provider 配置创建
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| ProviderError::ConfigurationError(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn get_base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// 构建完整的 API URL
    /// base_url 带不带 /v1 都能正确拼接
    pub fn build_url(&self, endpoint: &str) -> String {
        let base = self.get_base_url();
        let base = base.trim_end_matches('/');

        if base.ends_with("/v1") {
            format!("{}/{}", base, endpoint)
        } else {
            format!("{}/v1/{}", base, endpoint)
        }
    }

    /// 构建请求体
    ///
    /// 没有配置 prompt id 时省略 prompt 对象。
    pub fn build_request(&self, input: &str) -> ResponsesRequest {
        let prompt = self
            .config
            .prompt_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| PromptReference {
                id: id.clone(),
                version: self.config.prompt_version.clone(),
            });

        ResponsesRequest {
            prompt,
            model: self.config.model.clone(),
            input: input.to_string(),
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIResponsesProvider {
    async fn open_stream(&self, input: &str) -> Result<StreamResponse, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ProviderError::ConfigurationError("OpenAI API key not configured".to_string())
            })?;

        let url = self.build_url("responses");
        let request = self.build_request(input);

        tracing::info!(
            "[PROVIDER] 发起流式请求: url={} prompt={:?} model={:?}",
            url,
            request.prompt.as_ref().map(|p| p.id.as_str()),
            request.model
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("[PROVIDER] 请求失败: {} - {}", status, body);
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        tracing::info!("[PROVIDER] 流式响应开始: status={}", status);

        Ok(reqwest_stream_to_stream_response(resp))
    }

    fn provider_name(&self) -> &'static str {
        "OpenAIResponsesProvider"
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.as_ref().is_some_and(|key| !key.is_empty())
    }
}

// ============================================================================
// 测试模块
// ============================================================================
