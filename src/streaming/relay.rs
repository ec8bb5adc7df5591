//! 翻译流中继
//!
//! 把上游 SSE 字节流转换为发往客户端的逐行协议：
//!
//! ```text
//! 上游字节 -> SseFrameSplitter -> 记录分类 -> TokenParser -> Token 行 / 结束标记 / 错误标记
//! ```
//!
//! `TranslationRelay` 是同步状态机，不做任何 IO；`translate_stream` 在其外层
//! 负责打开上游、空闲超时和取消。

use crate::config::StreamConfig;
use crate::models::{Token, STREAM_END_MARKER, STREAM_ERROR_MARKER};
use crate::streaming::error::StreamError;
use crate::streaming::metrics::{StreamMetrics, StreamOutcome};
use crate::streaming::sse::{SseFrameSplitter, SseRecord};
use crate::streaming::token_parser::TokenParser;
use crate::streaming::traits::{CompletionProvider, StreamResponse};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 上游文本增量事件类型
pub const TEXT_DELTA_EVENT: &str = "response.output_text.delta";

/// 上游流结束负载
pub const DONE_PAYLOAD: &str = "[DONE]";

/// 一条 SSE 记录对应的处理动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// 无负载、非 JSON 或无关事件
    Skip,
    /// 文本增量，送入 Token 解析器
    Delta(String),
    /// 上游正常结束
    Done,
    /// 上游报告错误，附带错误消息
    Error(String),
}

/// 对一条上游 SSE 记录分类
pub fn classify_record(record: &SseRecord) -> RecordAction {
    let Some(payload) = record.payload() else {
        return RecordAction::Skip;
    };

    if record.event_name() == Some("error") {
        return RecordAction::Error(payload.to_string());
    }

    if payload == DONE_PAYLOAD {
        return RecordAction::Done;
    }

    let event: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return RecordAction::Skip,
    };

    let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or_default();

    if event_type == "error" || event_type.ends_with(".error") {
        let message = event
            .pointer("/error/message")
            .or_else(|| event.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or(event_type);
        return RecordAction::Error(message.to_string());
    }

    if event_type == TEXT_DELTA_EVENT {
        if let Some(delta) = event.get("delta").and_then(|d| d.as_str()) {
            return RecordAction::Delta(delta.to_string());
        }
    }

    RecordAction::Skip
}

/// 翻译流中继状态机
///
/// 每个请求独占一个实例。一旦写出结束标记或错误标记即进入终止状态，之后的输入全部忽略。
#[derive(Debug)]
pub struct TranslationRelay {
    splitter: SseFrameSplitter,
    parser: TokenParser,
    metrics: StreamMetrics,
    terminated: bool,
}

impl Default for TranslationRelay {
    fn default() -> Self {
        Self::new(SseFrameSplitter::DEFAULT_MAX_BUFFER_SIZE)
    }
}

impl TranslationRelay {
    /// 创建新的中继
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            splitter: SseFrameSplitter::with_max_buffer_size(max_buffer_bytes),
            parser: TokenParser::new(),
            metrics: StreamMetrics::new(),
            terminated: false,
        }
    }

    /// 是否已写出终止标记（或已被取消）
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// 获取指标
    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    /// 处理一个上游 chunk，返回要发往客户端的行（不含换行符）
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.terminated {
            return Vec::new();
        }

        self.metrics.record_chunk(chunk.len());

        match self.splitter.push(chunk) {
            Ok(records) => {
                let mut lines = Vec::new();
                self.process_records(records, &mut lines);
                lines
            }
            Err(err) => self.fail(&err),
        }
    }

    /// 上游响应体结束
    ///
    /// 处理缓冲区中的尾部记录；若尚未终止则写出结束标记。
    pub fn finish(&mut self) -> Vec<String> {
        if self.terminated {
            return Vec::new();
        }

        let mut lines = Vec::new();
        if let Some(record) = self.splitter.finish() {
            self.process_records(vec![record], &mut lines);
        }

        if !self.terminated {
            if self.parser.has_pending_token() {
                tracing::warn!("[STREAM] 上游结束时 Token 数组未闭合，尾部片段被丢弃");
            }
            self.complete(&mut lines);
        }
        lines
    }

    /// 以错误结束，返回错误标记行（已终止时为空）
    pub fn fail(&mut self, err: &StreamError) -> Vec<String> {
        if self.terminated {
            return Vec::new();
        }

        tracing::warn!(
            error_type = err.error_type(),
            retryable = err.is_retryable(),
            upstream_status = ?err.status_code(),
            "[STREAM] 翻译流失败: {}",
            err
        );
        self.terminated = true;
        self.sync_parser_counters();
        self.metrics
            .finish(StreamOutcome::Failed(err.error_type().to_string()));
        vec![STREAM_ERROR_MARKER.to_string()]
    }

    /// 客户端断开，静默结束
    pub fn cancel(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.sync_parser_counters();
        self.metrics.finish(StreamOutcome::Cancelled);
    }

    fn process_records(&mut self, records: Vec<SseRecord>, lines: &mut Vec<String>) {
        self.metrics.record_records(records.len());

        for record in records {
            match classify_record(&record) {
                RecordAction::Skip => {}
                RecordAction::Delta(delta) => {
                    let tokens = self.parser.consume(&delta);
                    self.metrics.record_tokens(tokens.len());
                    lines.extend(tokens.iter().map(Token::to_wire_line));
                }
                RecordAction::Done => {
                    self.complete(lines);
                    return;
                }
                RecordAction::Error(message) => {
                    lines.extend(self.fail(&StreamError::provider_error(200, message)));
                    return;
                }
            }
        }
    }

    fn complete(&mut self, lines: &mut Vec<String>) {
        self.terminated = true;
        self.sync_parser_counters();
        self.metrics.finish(StreamOutcome::Completed);
        lines.push(STREAM_END_MARKER.to_string());
    }

    fn sync_parser_counters(&mut self) {
        self.metrics
            .set_dropped_fragments(self.parser.dropped_count());
    }
}

// ============================================================================
// 异步流
// ============================================================================

/// 一行协议文本转为响应体 chunk
fn body_line(mut line: String) -> Result<Bytes, std::io::Error> {
    line.push('\n');
    Ok(Bytes::from(line))
}

/// 读取上游下一个 chunk，可选空闲超时
async fn next_chunk(
    upstream: &mut StreamResponse,
    idle_timeout: Option<Duration>,
) -> Option<Result<Bytes, StreamError>> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(StreamError::Timeout)),
        },
        None => upstream.next().await,
    }
}

/// 打开上游并生成发往客户端的响应体流
///
/// - 每个 Token 一行 JSON，最后一行是结束标记或错误标记
/// - 响应体流被丢弃（客户端断开）时 `cancel` 被触发，上游连接随之释放，不写出任何标记
/// - 上游只在响应体被轮询时读取
pub fn translate_stream(
    provider: Arc<dyn CompletionProvider>,
    input: String,
    config: StreamConfig,
    cancel: CancellationToken,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        let _cancel_on_drop = cancel.clone().drop_guard();
        let mut relay = TranslationRelay::new(config.max_buffer_bytes);
        let idle_timeout = config.idle_timeout();

        tracing::info!(
            request_id = %request_id,
            provider = provider.provider_name(),
            input_chars = input.chars().count(),
            "[STREAM] 开始翻译流"
        );

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = provider.open_stream(&input) => Some(result),
        };

        let mut upstream = match opened {
            None => {
                relay.cancel();
                tracing::info!(request_id = %request_id, "[STREAM] 客户端在上游响应前断开");
                relay.metrics().log_metrics(&request_id);
                return;
            }
            Some(Err(err)) => {
                tracing::error!(
                    request_id = %request_id,
                    error_type = err.error_type(),
                    retryable = err.is_retryable(),
                    "[STREAM] 打开上游失败: {}",
                    err
                );
                for line in relay.fail(&err.to_stream_error()) {
                    yield body_line(line);
                }
                relay.metrics().log_metrics(&request_id);
                return;
            }
            Some(Ok(upstream)) => upstream,
        };

        while !relay.is_terminated() {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = next_chunk(&mut upstream, idle_timeout) => Some(item),
            };

            let lines = match item {
                None => {
                    relay.cancel();
                    tracing::info!(request_id = %request_id, "[STREAM] 客户端断开，停止读取上游");
                    Vec::new()
                }
                Some(Some(Ok(chunk))) => relay.feed(&chunk),
                Some(Some(Err(err))) => relay.fail(&err),
                Some(None) => relay.finish(),
            };

            for line in lines {
                yield body_line(line);
            }
        }

        relay.metrics().log_metrics(&request_id);
    }
}

// ============================================================================
// 测试模块
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_record(delta: &str) -> String {
        let payload = serde_json::json!({ "type": TEXT_DELTA_EVENT, "delta": delta });
        format!("event: {}\ndata: {}\n\n", TEXT_DELTA_EVENT, payload)
    }

    fn word_line(input: &str, transcription: &str, output: &str) -> String {
        Token::word(input, transcription, output).to_wire_line()
    }

    #[test]
    fn test_classify_record() {
        let record = |event: Option<&str>, data: Option<&str>| SseRecord {
            event: event.map(str::to_string),
            data: data.map(str::to_string),
        };

        assert_eq!(classify_record(&record(Some("error"), None)), RecordAction::Skip);
        assert_eq!(
            classify_record(&record(Some("error"), Some("{}"))),
            RecordAction::Error("{}".to_string())
        );
        assert_eq!(classify_record(&record(None, Some("[DONE]"))), RecordAction::Done);
        assert_eq!(classify_record(&record(None, Some("not json"))), RecordAction::Skip);
        assert_eq!(
            classify_record(&record(None, Some(r#"{"type":"response.created"}"#))),
            RecordAction::Skip
        );
        assert_eq!(
            classify_record(&record(None, Some(r#"{"type":"response.output_text.delta","delta":7}"#))),
            RecordAction::Skip
        );
        assert_eq!(
            classify_record(&record(None, Some(r#"{"type":"response.output_text.delta","delta":"[["}"#))),
            RecordAction::Delta("[[".to_string())
        );
        assert_eq!(
            classify_record(&record(None, Some(r#"{"type":"error","error":{"message":"quota"}}"#))),
            RecordAction::Error("quota".to_string())
        );
        assert_eq!(
            classify_record(&record(None, Some(r#"{"type":"response.refusal.error"}"#))),
            RecordAction::Error("response.refusal.error".to_string())
        );
    }

    #[test]
    fn test_respell_deltas_then_done() {
        let mut relay = TranslationRelay::default();
        let mut lines = Vec::new();

        for delta in [
            r#"[["word","hola","OH-lah","hello"]"#,
            r#", [" "]]"#,
            r#", ["word","mundo","MOON-doh","world"]]"#,
        ] {
            lines.extend(relay.feed(delta_record(delta).as_bytes()));
        }
        lines.extend(relay.feed(b"data: [DONE]\n\n"));

        assert_eq!(
            lines,
            vec![
                word_line("hola", "OH-lah", "hello"),
                word_line("mundo", "MOON-doh", "world"),
                STREAM_END_MARKER.to_string(),
            ]
        );
        assert!(relay.is_terminated());
        assert_eq!(relay.metrics().token_count, 2);
        assert_eq!(relay.metrics().dropped_fragment_count, 1);
        assert_eq!(relay.metrics().outcome, StreamOutcome::Completed);

        // 终止后的输入被忽略
        assert!(relay.feed(delta_record("[\"x\",\"y\"]").as_bytes()).is_empty());
        assert!(relay.finish().is_empty());
    }

    #[test]
    fn test_error_event_after_tokens() {
        let mut relay = TranslationRelay::default();
        let body = format!(
            "{}{}event: error\ndata: {{\"type\":\"error\"}}\n\n{}",
            delta_record(r#"[["word","a","A","a"],"#),
            delta_record(r#"["punctuation","."],"#),
            delta_record(r#"["word","b","B","b"]]"#),
        );

        let lines = relay.feed(body.as_bytes());
        assert_eq!(
            lines,
            vec![
                word_line("a", "A", "a"),
                Token::literal("punctuation", ".").to_wire_line(),
                STREAM_ERROR_MARKER.to_string(),
            ]
        );
        assert!(!lines.iter().any(|l| l == STREAM_END_MARKER));
        assert!(matches!(relay.metrics().outcome, StreamOutcome::Failed(_)));
    }

    #[test]
    fn test_body_end_without_done_emits_end_marker() {
        let mut relay = TranslationRelay::default();
        let mut lines = relay.feed(delta_record(r#"[["space"," "]"#).as_bytes());
        // 最后一条记录缺少结束空行
        let trailing = delta_record("]");
        lines.extend(relay.feed(trailing.trim_end().as_bytes()));
        lines.extend(relay.finish());

        assert_eq!(
            lines,
            vec![
                Token::literal("space", " ").to_wire_line(),
                STREAM_END_MARKER.to_string(),
            ]
        );
    }

    #[test]
    fn test_unclosed_token_is_dropped_at_finish() {
        let mut relay = TranslationRelay::default();
        let mut lines = relay.feed(delta_record(r#"[["word","hola","OH-lah","hello"], ["word","mun"#).as_bytes());
        lines.extend(relay.finish());

        assert_eq!(
            lines,
            vec![
                Token::word("hola", "OH-lah", "hello").to_wire_line(),
                STREAM_END_MARKER.to_string(),
            ]
        );
    }

    #[test]
    fn test_trailing_done_without_delimiter() {
        let mut relay = TranslationRelay::default();
        assert!(relay.feed(b"data: [DONE]").is_empty());
        assert_eq!(relay.finish(), vec![STREAM_END_MARKER.to_string()]);
    }

    #[test]
    fn test_trailing_error_suppresses_end_marker() {
        let mut relay = TranslationRelay::default();
        relay.feed(b"data: {\"type\":\"response.error\"}");
        assert_eq!(relay.finish(), vec![STREAM_ERROR_MARKER.to_string()]);
    }

    #[test]
    fn test_buffer_overflow_fails_stream() {
        let mut relay = TranslationRelay::new(32);
        let lines = relay.feed(b"data: this upstream never sends a blank line");
        assert_eq!(lines, vec![STREAM_ERROR_MARKER.to_string()]);
        assert_eq!(
            relay.metrics().outcome,
            StreamOutcome::Failed("buffer_overflow".to_string())
        );
    }

    #[test]
    fn test_cancel_is_silent() {
        let mut relay = TranslationRelay::default();
        relay.feed(delta_record("[").as_bytes());
        relay.cancel();
        assert!(relay.is_terminated());
        assert!(relay.finish().is_empty());
        assert!(relay.fail(&StreamError::Timeout).is_empty());
        assert_eq!(relay.metrics().outcome, StreamOutcome::Cancelled);
    }

    #[test]
    fn test_fail_only_once() {
        let mut relay = TranslationRelay::default();
        assert_eq!(relay.fail(&StreamError::Timeout), vec![STREAM_ERROR_MARKER.to_string()]);
        assert!(relay.fail(&StreamError::Timeout).is_empty());
    }
}
