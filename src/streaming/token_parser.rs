//! 增量 Token 解析器
//!
//! 上游模型输出的是一个顶层 JSON 数组，每个元素是一个 Token 数组：
//!
//! ```text
//! [["word","hola","OH-lah","hello"], ["space"," "], ...]
//! ```
//!
//! 文本增量可能在任意位置被切分。解析器逐字符推进，每当一个内层数组闭合
//! 就立即解码并发出 Token，不等待外层数组结束。
//!
//! 无法解码的内层数组被静默丢弃，解析器在下一个 `[` 处重新同步。

use crate::models::{Token, WORD_KIND};
use serde_json::Value;

/// 增量 Token 解析器
///
/// 生命周期等同于一次流式会话，不跨会话复用。
///
/// # 示例
///
/// ```ignore
/// let mut parser = TokenParser::new();
/// let mut tokens = parser.consume("[[\"word\",\"hola\",");
/// tokens.extend(parser.consume("\"OH-lah\",\"hello\"]"));
/// assert_eq!(tokens.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TokenParser {
    /// 是否已进入外层数组（一旦进入永久有效）
    entered_array: bool,
    /// 是否正在收集一个内层数组
    collecting: bool,
    /// 当前内层数组的文本
    buffer: String,
    /// 括号深度（仅统计字符串外的括号）
    bracket_depth: u32,
    /// 是否在字符串内
    in_string: bool,
    /// 下一个字符是否被转义
    escaping: bool,
    /// 被丢弃的内层数组数量
    dropped_count: u32,
}

impl TokenParser {
    /// 创建新的解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 被丢弃（无法解码）的内层数组数量
    pub fn dropped_count(&self) -> u32 {
        self.dropped_count
    }

    /// 当前是否有未闭合的内层数组
    pub fn has_pending_token(&self) -> bool {
        self.collecting
    }

    /// 消费一段文本增量
    ///
    /// 返回本段增量中闭合的所有 Token，顺序与数组顺序一致。
    pub fn consume(&mut self, delta: &str) -> Vec<Token> {
        let mut tokens = Vec::new();

        for ch in delta.chars() {
            if !self.entered_array {
                if ch == '[' {
                    self.entered_array = true;
                }
                continue;
            }

            if !self.collecting {
                if ch == '[' {
                    self.begin_token();
                }
                continue;
            }

            self.buffer.push(ch);

            if self.in_string {
                if self.escaping {
                    self.escaping = false;
                } else if ch == '\\' {
                    self.escaping = true;
                } else if ch == '"' {
                    self.in_string = false;
                }
                continue;
            }

            match ch {
                '"' => self.in_string = true,
                '[' => self.bracket_depth += 1,
                ']' => {
                    self.bracket_depth -= 1;
                    if self.bracket_depth == 0 {
                        if let Some(token) = self.complete_token() {
                            tokens.push(token);
                        }
                    }
                }
                _ => {}
            }
        }

        tokens
    }

    fn begin_token(&mut self) {
        self.collecting = true;
        self.buffer.clear();
        self.buffer.push('[');
        self.bracket_depth = 1;
        self.in_string = false;
        self.escaping = false;
    }

    fn complete_token(&mut self) -> Option<Token> {
        self.collecting = false;
        let text = std::mem::take(&mut self.buffer);

        match decode_token_array(&text) {
            Some(token) => Some(token),
            None => {
                self.dropped_count += 1;
                tracing::debug!(fragment = %text, "[PARSER] 丢弃无法解码的 Token 片段");
                None
            }
        }
    }
}

/// 解码一个完整的内层数组文本
///
/// 数组长度至少为 2，且首元素为字符串（kind）。kind 为 `"word"` 且长度不少于 4
/// 时构造单词，否则构造字面量。缺失或非字符串的元素按空字符串处理。
pub fn decode_token_array(text: &str) -> Option<Token> {
    let value: Value = serde_json::from_str(text).ok()?;
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }

    let kind = items[0].as_str()?;
    let field = |index: usize| -> String {
        items
            .get(index)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if kind == WORD_KIND && items.len() >= 4 {
        return Some(Token::word(field(1), field(2), field(3)));
    }

    Some(Token::literal(kind, field(1)))
}

// ============================================================================
// 测试模块
// ============================================================================


// ============================================================================
// 属性测试（Property-Based Testing）
// ============================================================================
