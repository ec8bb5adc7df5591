//! HTTP 端点处理器

pub mod stream;

pub use stream::{method_not_allowed, stream_options, stream_translation, REQUEST_ID_HEADER};
