//! 客户端响应分帧
//!
//! 服务端响应可以是裸的逐行协议，也可以是完整的 SSE。两者都还原为 `FramedItem`。

use crate::config::FramingMode;
use crate::streaming::error::StreamError;
use crate::streaming::sse::{take_valid_utf8, SseFrameSplitter, SseRecord};

/// SSE 的 Content-Type
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// 分帧后的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramedItem {
    /// 一行负载（Token、结束标记或错误标记）
    Payload(String),
    /// SSE `done` 事件
    Done,
    /// SSE `error` 事件
    Error,
}

/// 实际使用的分帧方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Lines,
    Sse,
}

impl Framing {
    /// 由配置和响应 Content-Type 决定分帧方式
    pub fn resolve(mode: FramingMode, content_type: Option<&str>) -> Self {
        match mode {
            FramingMode::Lines => Framing::Lines,
            FramingMode::Sse => Framing::Sse,
            FramingMode::Auto => {
                let is_event_stream = content_type
                    .map(|ct| ct.to_ascii_lowercase().contains(EVENT_STREAM_CONTENT_TYPE))
                    .unwrap_or(false);
                if is_event_stream {
                    Framing::Sse
                } else {
                    Framing::Lines
                }
            }
        }
    }
}

/// 逐行切分器
///
/// `\r\n` 规范化为 `\n`（包括跨 chunk 的情况），不完整的 UTF-8 序列留到下一个 chunk。
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
    pending_bytes: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一个 chunk，返回所有完整的行（不含换行符）
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = take_valid_utf8(&mut self.pending_bytes);
        self.buffer.push_str(&text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// 结束时返回没有换行符的尾部
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.buffer.push_str(&tail);
        }
        let mut rest = std::mem::take(&mut self.buffer);
        if rest.ends_with('\r') {
            rest.pop();
        }
        (!rest.is_empty()).then_some(rest)
    }
}

/// SSE 记录转为分帧项
///
/// 没有 data 的记录跳过；`error` / `done` 事件名优先于负载。
fn record_to_item(record: SseRecord) -> Option<FramedItem> {
    let data = record.data?;
    match record.event.as_deref().map(str::trim) {
        Some("error") => Some(FramedItem::Error),
        Some("done") => Some(FramedItem::Done),
        _ => Some(FramedItem::Payload(data)),
    }
}

/// 响应体解码器
#[derive(Debug)]
pub struct PayloadDecoder {
    framing: Framing,
    lines: LineSplitter,
    sse: SseFrameSplitter,
}

impl PayloadDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            lines: LineSplitter::new(),
            sse: SseFrameSplitter::new(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// 处理一个 chunk
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<FramedItem>, StreamError> {
        match self.framing {
            Framing::Lines => Ok(self
                .lines
                .push(chunk)
                .into_iter()
                .filter(|line| !line.is_empty())
                .map(FramedItem::Payload)
                .collect()),
            Framing::Sse => Ok(self
                .sse
                .push(chunk)?
                .into_iter()
                .filter_map(record_to_item)
                .collect()),
        }
    }

    /// 响应体结束，处理尾部
    pub fn finish(&mut self) -> Vec<FramedItem> {
        match self.framing {
            Framing::Lines => self
                .lines
                .finish()
                .map(FramedItem::Payload)
                .into_iter()
                .collect(),
            Framing::Sse => self.sse.finish().and_then(record_to_item).into_iter().collect(),
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> FramedItem {
        FramedItem::Payload(s.to_string())
    }

    #[test]
    fn test_resolve_framing() {
        assert_eq!(
            Framing::resolve(FramingMode::Auto, Some("text/event-stream; charset=utf-8")),
            Framing::Sse
        );
        assert_eq!(
            Framing::resolve(FramingMode::Auto, Some("text/plain; charset=utf-8")),
            Framing::Lines
        );
        assert_eq!(Framing::resolve(FramingMode::Auto, None), Framing::Lines);
        assert_eq!(
            Framing::resolve(FramingMode::Lines, Some("text/event-stream")),
            Framing::Lines
        );
        assert_eq!(Framing::resolve(FramingMode::Sse, None), Framing::Sse);
    }

    #[test]
    fn test_line_splitter() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"one\r"), Vec::<String>::new());
        assert_eq!(splitter.push(b"\ntwo\nthr"), vec!["one", "two"]);
        assert_eq!(splitter.push(b"ee\n\n"), vec!["three", ""]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_line_splitter_utf8_and_tail() {
        let mut splitter = LineSplitter::new();
        let bytes = "é\n<end:)>".as_bytes();
        assert!(splitter.push(&bytes[..1]).is_empty());
        assert_eq!(splitter.push(&bytes[1..]), vec!["é"]);
        assert_eq!(splitter.finish(), Some("<end:)>".to_string()));
    }

    #[test]
    fn test_lines_decoder_skips_empty_lines() {
        let mut decoder = PayloadDecoder::new(Framing::Lines);
        let items = decoder.push(b"{\"type\":\"space\",\"value\":\" \"}\n\n<end:)>\n").unwrap();
        assert_eq!(
            items,
            vec![payload(r#"{"type":"space","value":" "}"#), payload("<end:)>")]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_sse_decoder_events() {
        let mut decoder = PayloadDecoder::new(Framing::Sse);
        let items = decoder
            .push(b"data: a\n\nevent: ping\n\nevent: done\ndata: x\n\nevent: error\ndata: y\n\n")
            .unwrap();
        assert_eq!(items, vec![payload("a"), FramedItem::Done, FramedItem::Error]);
    }

    #[test]
    fn test_sse_decoder_trailing_record() {
        let mut decoder = PayloadDecoder::new(Framing::Sse);
        assert!(decoder.push(b"data: <end:)>").unwrap().is_empty());
        assert_eq!(decoder.finish(), vec![payload("<end:)>")]);
    }

    #[test]
    fn test_sse_event_name_trimmed() {
        let mut decoder = PayloadDecoder::new(Framing::Sse);
        let items = decoder.push(b"event: done \ndata: x\n\n").unwrap();
        assert_eq!(items, vec![FramedItem::Done]);
    }
}
