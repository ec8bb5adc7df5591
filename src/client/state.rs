//! 客户端会话状态
//!
//! 会话管理器对外发布的只读快照，以及由快照推导的翻译按钮状态。

use serde::{Deserialize, Serialize};

use crate::config::TransformationMode;
use crate::models::Token;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// 没有进行中的请求
    #[default]
    Idle,
    /// 已发出请求，尚未收到 Token
    Sending,
    /// 已收到至少一个 Token
    Streaming,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }
}

/// 翻译按钮
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateButton {
    Next,
    Loading,
    Stop,
    Repeat,
}

impl TranslateButton {
    /// 由阶段、是否有上一次翻译、是否正在查看结果页推导
    pub fn project(phase: SessionPhase, has_last_translation: bool, viewing_result: bool) -> Self {
        match phase {
            SessionPhase::Sending => TranslateButton::Loading,
            SessionPhase::Streaming => TranslateButton::Stop,
            SessionPhase::Idle if viewing_result && has_last_translation => {
                TranslateButton::Repeat
            }
            SessionPhase::Idle => TranslateButton::Next,
        }
    }
}

/// 一次翻译请求的参数
///
/// 序列化后作为服务端请求体中 `message` 字段的字符串值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    #[serde(rename = "input_language")]
    pub source_language: String,
    pub target_language: String,
    pub input: String,
}

impl TranslationRequest {
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            input: input.into(),
        }
    }

    /// `message` 字段的值
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 完整的服务端请求体 `{"message": "..."}`
    pub fn to_request_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        Ok(serde_json::json!({ "message": self.to_message()? }))
    }
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    /// 当前阶段
    pub phase: SessionPhase,
    /// 活跃会话的编号
    pub session_id: Option<u64>,
    /// 按到达顺序排列的 Token，下标即 Token 的键
    pub tokens: Vec<Token>,
    /// 最近一次会话以错误结束
    pub has_error: bool,
    /// 最近一次发出的请求（用于 repeat）
    pub last_translation: Option<TranslationRequest>,
    /// 是否正在查看结果页
    pub viewing_result: bool,
    /// 当前选择的源语言
    pub source_language: String,
    /// 当前选择的目标语言
    pub target_language: String,
    /// 当前转换模式
    pub mode: TransformationMode,
}

impl SessionSnapshot {
    /// 翻译按钮状态
    pub fn translate_button(&self) -> TranslateButton {
        TranslateButton::project(
            self.phase,
            self.last_translation.is_some(),
            self.viewing_result,
        )
    }

    /// 带下标的 Token
    pub fn indexed_tokens(&self) -> impl Iterator<Item = (usize, &Token)> {
        self.tokens.iter().enumerate()
    }

    /// 拼接所有 Token 的展示文本
    pub fn rendered_text(&self) -> String {
        self.tokens.iter().map(Token::display_text).collect()
    }
}
