//! SSE 帧切分器
//!
//! 将任意切分的 Server-Sent-Events 字节流还原为独立的记录。
//! 记录以空行（`\n\n`）结束，`\r\n` 先被规范化为 `\n`。
//!
//! - 跨 chunk 的帧、跨 chunk 的 `\r\n` 和跨 chunk 的 UTF-8 字符都会被正确拼接
//! - 流结束时，缓冲区中没有结束空行的非空尾部仍作为最后一条记录解析

use crate::streaming::error::StreamError;

/// 记录分隔符
const RECORD_DELIMITER: &str = "\n\n";

/// 一条解码后的 SSE 记录
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseRecord {
    /// `event:` 字段（最后一次出现的值）
    pub event: Option<String>,
    /// 所有 `data:` 行以 `\n` 连接；没有 data 行时为 None
    pub data: Option<String>,
}

impl SseRecord {
    /// 获取事件名
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// 获取数据负载（无负载的记录应被调用者跳过）
    pub fn payload(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

/// 解析一条原始记录文本
///
/// `event:` 与 `data:` 的值只去掉一个前导空格。其他行（注释、`id:` 等）忽略。
pub fn parse_record(raw: &str) -> SseRecord {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.split('\n') {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(strip_one_space(value).to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(strip_one_space(value));
        }
    }

    SseRecord {
        event,
        data: if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        },
    }
}

fn strip_one_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

/// SSE 帧切分器
///
/// # 示例
///
/// ```ignore
/// let mut splitter = SseFrameSplitter::new();
/// for chunk in chunks {
///     for record in splitter.push(&chunk)? {
///         if let Some(data) = record.payload() { /* ... */ }
///     }
/// }
/// if let Some(record) = splitter.finish() { /* ... */ }
/// ```
#[derive(Debug)]
pub struct SseFrameSplitter {
    /// 已规范化、尚未形成完整记录的文本
    buffer: String,
    /// 尚未构成完整 UTF-8 字符的字节
    pending_bytes: Vec<u8>,
    /// 上一个 chunk 以 `\r` 结尾，需要与下一个 chunk 一起规范化
    pending_cr: bool,
    /// 下一次查找分隔符的起始位置
    scan_from: usize,
    /// 最大缓冲区大小（防止内存耗尽）
    max_buffer_size: usize,
}

impl Default for SseFrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SseFrameSplitter {
    /// 默认最大缓冲区大小 (1MB)
    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

    /// 创建新的切分器
    pub fn new() -> Self {
        Self::with_max_buffer_size(Self::DEFAULT_MAX_BUFFER_SIZE)
    }

    /// 创建带自定义缓冲区上限的切分器
    pub fn with_max_buffer_size(max_size: usize) -> Self {
        Self {
            buffer: String::new(),
            pending_bytes: Vec::new(),
            pending_cr: false,
            scan_from: 0,
            max_buffer_size: max_size,
        }
    }

    /// 当前缓冲区大小（字节）
    pub fn buffer_size(&self) -> usize {
        self.buffer.len() + self.pending_bytes.len()
    }

    /// 处理一个字节 chunk
    ///
    /// 返回本次调用中完成的所有记录（包括没有 data 的记录）。
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseRecord>, StreamError> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        self.pending_bytes.extend_from_slice(chunk);
        let text = take_valid_utf8(&mut self.pending_bytes);
        self.append_text(&text);
        self.drain_records()
    }

    /// 结束切分
    ///
    /// 如果缓冲区中还有非空白内容，将其作为最后一条记录返回。
    pub fn finish(&mut self) -> Option<SseRecord> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.buffer.push_str(&tail);
        }
        if self.pending_cr {
            self.pending_cr = false;
            self.buffer.push('\r');
        }

        let remainder = std::mem::take(&mut self.buffer);
        self.scan_from = 0;

        if remainder.trim().is_empty() {
            return None;
        }

        Some(parse_record(&remainder))
    }

    fn append_text(&mut self, text: &str) {
        let mut text = if self.pending_cr {
            self.pending_cr = false;
            format!("\r{text}")
        } else {
            text.to_string()
        };

        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }

        self.buffer.push_str(&text.replace("\r\n", "\n"));
    }

    fn drain_records(&mut self) -> Result<Vec<SseRecord>, StreamError> {
        let mut records = Vec::new();
        let mut cursor = 0;

        while let Some(offset) = self.buffer[self.scan_from.max(cursor)..].find(RECORD_DELIMITER) {
            let boundary = self.scan_from.max(cursor) + offset;
            records.push(parse_record(&self.buffer[cursor..boundary]));
            cursor = boundary + RECORD_DELIMITER.len();
            self.scan_from = cursor;
        }

        if cursor > 0 {
            self.buffer.drain(..cursor);
        }
        // 分隔符可能被切在末尾，下一次从最后一个字符开始查找
        self.scan_from = self.buffer.len().saturating_sub(1);
        while !self.buffer.is_char_boundary(self.scan_from) {
            self.scan_from -= 1;
        }

        if self.buffer_size() > self.max_buffer_size {
            tracing::error!(
                buffer_size = self.buffer_size(),
                buffer_limit = self.max_buffer_size,
                "[SSE] 缓冲区溢出"
            );
            return Err(StreamError::BufferOverflow);
        }

        Ok(records)
    }
}

/// 取出字节缓冲区中所有完整的 UTF-8 文本
///
/// 末尾不完整的多字节序列留在缓冲区中；中间的非法字节替换为 U+FFFD。
pub(crate) fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();

    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                return out;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                // valid_up_to 之前的字节已验证为合法 UTF-8
                out.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                match err.error_len() {
                    Some(invalid_len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + invalid_len);
                    }
                    None => {
                        pending.drain(..valid_up_to);
                        return out;
                    }
                }
            }
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================


// ============================================================================
// 属性测试（Property-Based Testing）
// ============================================================================
