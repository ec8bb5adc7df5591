//! CompletionProvider Trait 定义
//!
//! 上游流式补全接口。代理只依赖这个 trait，测试中可以替换为假的上游。

use crate::providers::ProviderError;
use crate::streaming::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// 流式响应类型别名
///
/// 上游原始响应体的字节流，每个 Item 是一个 chunk 或传输错误。
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// 流式补全 Provider Trait
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 以给定输入打开一个流式补全
    ///
    /// 上游返回非成功状态码时返回 `Err`，否则返回 SSE 格式的原始字节流。
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut stream = provider.open_stream("hola mundo").await?;
    /// while let Some(chunk) = stream.next().await {
    ///     let bytes = chunk?;
    /// }
    /// ```
    async fn open_stream(&self, input: &str) -> Result<StreamResponse, ProviderError>;

    /// 获取 Provider 名称
    ///
    /// 用于日志记录。
    fn provider_name(&self) -> &'static str;

    /// 是否已具备发起请求所需的配置
    fn is_configured(&self) -> bool {
        true
    }
}

/// 将 reqwest 的 bytes_stream 转换为 StreamResponse
pub fn reqwest_stream_to_stream_response(response: reqwest::Response) -> StreamResponse {
    use futures::StreamExt;

    let stream = response.bytes_stream().map(|result| result.map_err(StreamError::from));

    Box::pin(stream)
}

/// 由内存中的 chunk 构造 StreamResponse
pub fn chunks_to_stream_response<I>(chunks: I) -> StreamResponse
where
    I: IntoIterator<Item = Result<Bytes, StreamError>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks))
}

// ============================================================================
// 测试模块
// ============================================================================
