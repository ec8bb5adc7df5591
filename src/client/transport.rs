//! 客户端传输层
//!
//! 会话管理器通过 `TranslationTransport` 打开一个翻译流，得到分帧后的负载流。

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use thiserror::Error;

use crate::client::framing::{FramedItem, Framing, PayloadDecoder};
use crate::client::state::TranslationRequest;
use crate::config::{ClientConfig, TransformationMode};
use crate::streaming::error::StreamError;

/// 传输错误
///
/// 对会话而言都等同于错误标记。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 服务端返回非成功状态码
    #[error("服务端返回错误状态: {0}")]
    Status(u16),

    /// 读取或分帧失败
    #[error("流读取失败: {0}")]
    Stream(#[from] StreamError),

    /// 请求无法构造
    #[error("请求构造失败: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// 分帧后的负载流
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<FramedItem, TransportError>> + Send>>;

/// 翻译传输
#[async_trait]
pub trait TranslationTransport: Send + Sync {
    /// 打开一个翻译流
    async fn open(
        &self,
        request: &TranslationRequest,
        mode: TransformationMode,
    ) -> Result<PayloadStream, TransportError>;
}

/// 基于 reqwest 的 HTTP 传输
pub struct HttpTransport {
    config: ClientConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    /// 模式对应的请求 URL
    pub fn url_for(&self, mode: TransformationMode) -> String {
        ClientConfig {
            mode,
            ..self.config.clone()
        }
        .stream_url()
    }
}

#[async_trait]
impl TranslationTransport for HttpTransport {
    async fn open(
        &self,
        request: &TranslationRequest,
        mode: TransformationMode,
    ) -> Result<PayloadStream, TransportError> {
        let url = self.url_for(mode);
        let body = request
            .to_request_body()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        tracing::debug!("[SESSION] 打开翻译流: url={}", url);

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("[SESSION] 服务端返回错误状态: {}", status);
            return Err(TransportError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let framing = Framing::resolve(self.config.framing, content_type.as_deref());
        tracing::debug!("[SESSION] 响应分帧: {:?}", framing);

        let mut body = Box::pin(resp.bytes_stream());
        let stream = async_stream::stream! {
            let mut decoder = PayloadDecoder::new(framing);
            while let Some(chunk) = body.next().await {
                let items = match chunk {
                    Ok(bytes) => decoder.push(&bytes).map_err(TransportError::from),
                    Err(err) => Err(TransportError::from(StreamError::from(err))),
                };
                match items {
                    Ok(items) => {
                        for item in items {
                            yield Ok(item);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            for item in decoder.finish() {
                yield Ok(item);
            }
        };

        Ok(Box::pin(stream))
    }
}
