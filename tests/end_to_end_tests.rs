//! 端到端测试
//!
//! 假上游 -> 代理服务器（真实 TCP 监听）-> HttpTransport + 会话管理器。

use std::sync::Arc;

use axum::{http::header, routing::post, Router};
use tokio_util::sync::CancellationToken;

use sapopinguino_lib::client::{HttpTransport, SessionPhase, StreamSessionManager};
use sapopinguino_lib::config::{ClientConfig, Config, FramingMode, ProviderConfig, TransformationMode};
use sapopinguino_lib::models::Token;
use sapopinguino_lib::providers::OpenAIResponsesProvider;
use sapopinguino_lib::server::{build_router, AppState};
use sapopinguino_lib::streaming::TEXT_DELTA_EVENT;

/// 端到端测试上下文
struct E2ETestContext {
    endpoint: String,
    shutdown: CancellationToken,
}

impl E2ETestContext {
    /// 启动假上游和代理
    async fn new(upstream_body: String) -> Self {
        let upstream = Router::new().route(
            "/v1/responses",
            post(move || {
                let body = upstream_body.clone();
                async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }
            }),
        );
        let upstream_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream_listener.local_addr().unwrap();

        let mut config = Config::default();
        config.provider = ProviderConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Some(format!("http://{}", upstream_addr)),
            ..ProviderConfig::default()
        };
        let provider = OpenAIResponsesProvider::new(config.provider.clone()).unwrap();
        let proxy = build_router(AppState::new(Arc::new(provider), config));
        let proxy_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = proxy_listener.local_addr().unwrap();

        let shutdown = CancellationToken::new();
        let upstream_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(upstream_listener, upstream)
                .with_graceful_shutdown(async move { upstream_shutdown.cancelled().await })
                .await
                .unwrap();
        });
        let proxy_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(proxy_listener, proxy)
                .with_graceful_shutdown(async move { proxy_shutdown.cancelled().await })
                .await
                .unwrap();
        });

        Self {
            endpoint: format!("http://{}", proxy_addr),
            shutdown,
        }
    }

    fn manager(&self, mode: TransformationMode, framing: FramingMode) -> StreamSessionManager {
        let config = ClientConfig {
            endpoint: self.endpoint.clone(),
            mode,
            framing,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(config.clone()).unwrap();
        StreamSessionManager::new(Arc::new(transport), &config)
    }
}

impl Drop for E2ETestContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn delta_record(delta: &str) -> String {
    let payload = serde_json::json!({ "type": TEXT_DELTA_EVENT, "delta": delta });
    format!("event: {}\ndata: {}\n\n", TEXT_DELTA_EVENT, payload)
}

fn scenario_body() -> String {
    [
        delta_record(r#"[["word","hola","OH-"#),
        delta_record(r#"lah","hello"]"#),
        delta_record(r#", ["space"," "], ["word","mundo","MOON-doh","world"]]"#),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat()
}

#[tokio::test]
async fn test_client_receives_tokens_through_proxy() {
    let ctx = E2ETestContext::new(scenario_body()).await;
    let manager = ctx.manager(TransformationMode::Respell, FramingMode::Auto);

    manager.send("hola mundo");
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(5), manager.wait_idle())
        .await
        .unwrap();

    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert!(!snapshot.has_error);
    assert_eq!(
        snapshot.tokens,
        vec![
            Token::word("hola", "OH-lah", "hello"),
            Token::literal("space", " "),
            Token::word("mundo", "MOON-doh", "world"),
        ]
    );
    assert_eq!(snapshot.rendered_text(), "hello world");
}

#[tokio::test]
async fn test_upstream_error_reaches_client() {
    let body = [
        delta_record(r#"[["word","hola","OH-lah","hello"]"#),
        "event: error\ndata: {\"type\":\"error\"}\n\n".to_string(),
    ]
    .concat();
    let ctx = E2ETestContext::new(body).await;
    let manager = ctx.manager(TransformationMode::Respell, FramingMode::Lines);

    manager.send("hola");
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(5), manager.wait_idle())
        .await
        .unwrap();

    assert!(snapshot.has_error);
    assert_eq!(snapshot.tokens, vec![Token::word("hola", "OH-lah", "hello")]);
}

#[tokio::test]
async fn test_unknown_route_is_transport_error() {
    let ctx = E2ETestContext::new(scenario_body()).await;
    // 代理只提供逐 Token 路由，翻译路由返回 404
    let manager = ctx.manager(TransformationMode::Translate, FramingMode::Auto);

    manager.send("hola");
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(5), manager.wait_idle())
        .await
        .unwrap();

    assert!(snapshot.has_error);
    assert!(snapshot.tokens.is_empty());
}
