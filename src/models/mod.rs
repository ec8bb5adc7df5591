//! 数据模型

pub mod token;

pub use token::{
    LiteralToken, Token, TokenDecodeError, WordToken, STREAM_END_MARKER, STREAM_ERROR_MARKER,
    WORD_KIND,
};
