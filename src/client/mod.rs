//! 翻译客户端模块
//!
//! 会话管理器、响应分帧、HTTP 传输和语言目录。
//!
//! # 主要组件
//!
//! - `session`: 流式会话管理器（单活跃会话）
//! - `framing`: 逐行 / SSE 响应分帧
//! - `transport`: TranslationTransport trait 与 HTTP 实现
//! - `state`: 会话快照与按钮状态
//! - `languages`: 语言目录

pub mod framing;
pub mod languages;
pub mod session;
pub mod state;
pub mod transport;

pub use framing::{FramedItem, Framing, LineSplitter, PayloadDecoder, EVENT_STREAM_CONTENT_TYPE};
pub use session::{interpret_payload, PayloadOutcome, StreamSessionManager, TRANSLATE_KIND};
pub use state::{SessionPhase, SessionSnapshot, TranslateButton, TranslationRequest};
pub use transport::{HttpTransport, PayloadStream, TranslationTransport, TransportError};
