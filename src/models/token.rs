//! 转写 Token 数据模型
//!
//! 定义流式翻译输出的最小单元，以及 Token 在行协议中的 JSON 编解码。
//!
//! 线路格式（每行一个 JSON 对象）：
//!
//! ```text
//! {"type":"word","input":"hola","transcription":"OH-lah","output":"hello"}
//! {"type":"punctuation","value":","}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 流成功结束标记（独占一行）
pub const STREAM_END_MARKER: &str = "<end:)>";

/// 流错误标记（独占一行，之后不再有任何内容）
pub const STREAM_ERROR_MARKER: &str = "<error:/>";

/// 单词 Token 的 kind
pub const WORD_KIND: &str = "word";

/// 单词 Token
///
/// 一个输入单词，附带其语音转写和最终输出。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    /// 原始输入单词
    pub input: String,
    /// 语音转写（respelling）
    pub transcription: String,
    /// 渲染输出
    pub output: String,
}

/// 字面量 Token
///
/// 标点、空白或透传文本。`kind` 原样保留上游给出的标签。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralToken {
    pub kind: String,
    pub value: String,
}

/// 转写 Token
///
/// 一旦发出即不可变。消费者按发出顺序追加存储。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireToken", into = "WireToken")]
pub enum Token {
    Word(WordToken),
    Literal(LiteralToken),
}

impl Token {
    /// 创建单词 Token
    pub fn word(
        input: impl Into<String>,
        transcription: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Token::Word(WordToken {
            input: input.into(),
            transcription: transcription.into(),
            output: output.into(),
        })
    }

    /// 创建字面量 Token
    pub fn literal(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Token::Literal(LiteralToken {
            kind: kind.into(),
            value: value.into(),
        })
    }

    /// 获取 Token 的 kind 标签
    pub fn kind(&self) -> &str {
        match self {
            Token::Word(_) => WORD_KIND,
            Token::Literal(literal) => &literal.kind,
        }
    }

    /// 获取用于展示的文本
    ///
    /// 单词返回输出，字面量返回原值。
    pub fn display_text(&self) -> &str {
        match self {
            Token::Word(word) => &word.output,
            Token::Literal(literal) => &literal.value,
        }
    }

    /// 编码为一行协议文本（不含换行符）
    pub fn to_wire_line(&self) -> String {
        // WireToken 只包含字符串字段，序列化不会失败
        serde_json::to_string(&WireToken::from(self.clone())).unwrap_or_default()
    }

    /// 从一行协议文本解码
    pub fn from_wire_line(line: &str) -> Result<Self, TokenDecodeError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Token 解码错误
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    /// 不是合法 JSON，或字段类型错误
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON 合法但无法构成 Token
    #[error("无效的 Token 结构: {0}")]
    InvalidShape(String),
}

/// Token 的线路表示
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToken {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transcription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl From<Token> for WireToken {
    fn from(token: Token) -> Self {
        match token {
            Token::Word(word) => WireToken {
                kind: WORD_KIND.to_string(),
                input: Some(word.input),
                transcription: Some(word.transcription),
                output: Some(word.output),
                value: None,
            },
            Token::Literal(literal) => WireToken {
                kind: literal.kind,
                input: None,
                transcription: None,
                output: None,
                value: Some(literal.value),
            },
        }
    }
}

impl TryFrom<WireToken> for Token {
    type Error = TokenDecodeError;

    fn try_from(wire: WireToken) -> Result<Self, Self::Error> {
        if wire.kind == WORD_KIND {
            if let (Some(input), Some(transcription), Some(output)) =
                (wire.input, wire.transcription, wire.output)
            {
                return Ok(Token::Word(WordToken {
                    input,
                    transcription,
                    output,
                }));
            }
        }

        // 缺少单词字段的 "word" 会退化为字面量，必须带 value
        match wire.value {
            Some(value) => Ok(Token::Literal(LiteralToken {
                kind: wire.kind,
                value,
            })),
            None => Err(TokenDecodeError::InvalidShape(format!(
                "kind={} 既不是完整单词也没有 value",
                wire.kind
            ))),
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================


// ============================================================================
// 属性测试（Property-Based Testing）
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9\\u4e00-\\u9fff .,!?\"\\\\\\-_]{0,40}").unwrap()
    }

    fn arb_token() -> impl Strategy<Value = Token> {
        prop_oneof![
            (arb_text(), arb_text(), arb_text()).prop_map(|(i, t, o)| Token::word(i, t, o)),
            ("[a-z]{1,12}", arb_text()).prop_map(|(k, v)| Token::literal(k, v)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// 编码为协议行后再解码，得到相同的 Token
        #[test]
        fn prop_wire_line_round_trip(token in arb_token()) {
            let line = token.to_wire_line();
            prop_assert!(!line.contains('\n'), "协议行不能包含换行符");
            let decoded = Token::from_wire_line(&line).expect("应该可以解码");
            prop_assert_eq!(decoded, token);
        }
    }
}
