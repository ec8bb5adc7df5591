//! 流式传输核心模块
//!
//! 上游 SSE 字节流到逐行 Token 协议的增量转换。
//!
//! # 主要组件
//!
//! - `sse`: SSE 帧切分器
//! - `token_parser`: 增量 Token 解析器
//! - `relay`: 翻译流中继（切分 + 解析 + 标记）
//! - `traits`: CompletionProvider trait 定义
//! - `error`: 流式错误类型定义
//! - `metrics`: 流式指标类型定义

pub mod error;
pub mod metrics;
pub mod relay;
pub mod sse;
pub mod token_parser;
pub mod traits;

// 重新导出核心类型
pub use error::StreamError;
pub use metrics::{StreamMetrics, StreamOutcome};
pub use relay::{classify_record, translate_stream, RecordAction, TranslationRelay, TEXT_DELTA_EVENT};
pub use sse::{parse_record, SseFrameSplitter, SseRecord};
pub use token_parser::{decode_token_array, TokenParser};
pub use traits::{
    chunks_to_stream_response, reqwest_stream_to_stream_response, CompletionProvider,
    StreamResponse,
};
