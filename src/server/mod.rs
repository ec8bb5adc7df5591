//! HTTP 服务器模块
//!
//! 单一路由的流式翻译代理。每个请求拥有独立的解析器和上游连接，请求之间没有共享的可变状态。

pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::streaming::CompletionProvider;

/// 服务器共享状态
#[derive(Clone)]
pub struct AppState {
    /// 上游 Provider
    pub provider: Arc<dyn CompletionProvider>,
    /// 启动时加载的配置（只读）
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: Config) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let route = state.config.server.route.clone();
    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        .route(
            &route,
            post(handlers::stream_translation)
                .options(handlers::stream_options)
                .fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动服务器，直到 `shutdown` 完成
pub async fn run_server<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.bind_address();
    let route = state.config.server.route.clone();

    if !state.provider.is_configured() {
        tracing::warn!(
            "[SERVER] Provider {} 未配置 API key，所有请求都会以错误标记结束",
            state.provider.provider_name()
        );
    }

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            std::io::Error::new(e.kind(), format!("端口已被占用: {}", addr))
        } else {
            e
        }
    })?;

    tracing::info!("[SERVER] 监听 http://{}{}", addr, route);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("[SERVER] 服务器已停止");
    Ok(())
}

/// 等待 Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SERVER] 无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SERVER] 收到 Ctrl-C，开始优雅关闭");
}
