//! 上游 Provider 模块

pub mod error;
pub mod openai_responses;

pub use error::ProviderError;
pub use openai_responses::{OpenAIResponsesProvider, PromptReference, ResponsesRequest};
