//! Sapopinguino 流式翻译
//!
//! - `server`: 把上游 SSE 转成逐行 Token 协议的 HTTP 代理
//! - `client`: 消费逐行协议的会话运行时

pub mod client;
pub mod config;
pub mod models;
pub mod providers;
pub mod server;
pub mod streaming;
pub mod telemetry;

pub use client::{HttpTransport, SessionPhase, SessionSnapshot, StreamSessionManager};
pub use config::Config;
pub use models::Token;
pub use providers::OpenAIResponsesProvider;
pub use server::{build_router, run_server, AppState};
