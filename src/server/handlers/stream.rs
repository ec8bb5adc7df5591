//! 流式翻译端点处理器
//!
//! - `POST`: 校验 `{"message": string}`，返回逐行 Token 流
//! - `OPTIONS`: 204 预检响应
//! - 其他方法: 405
//!
//! 所有响应都带 CORS 头。

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

use crate::models::STREAM_ERROR_MARKER;
use crate::server::AppState;
use crate::streaming::translate_stream;

/// 请求 ID 响应头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 从请求体中提取非空的 `message`
///
/// 请求体不是 JSON、`message` 缺失、不是字符串、为空或超过 `max_chars` 个字符时返回 None。
pub fn extract_message(body: &[u8], max_chars: Option<usize>) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let message = value.get("message")?.as_str()?;
    if message.is_empty() {
        return None;
    }
    if max_chars.is_some_and(|max| message.chars().count() > max) {
        return None;
    }
    Some(message.to_string())
}

/// 构建带 CORS 头的响应
fn cors_response(allow_origin: &str, status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_str(allow_origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    response
}

/// POST 处理器
///
/// 请求体读取失败（超过 `max_body_bytes` 时为 413）和校验失败一样，返回带 CORS 头的错误标记。
pub async fn stream_translation(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let allow_origin = state.config.server.allow_origin();

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            tracing::warn!(status = %status, "[SERVER] 请求体读取失败: {}", rejection.body_text());
            return cors_response(allow_origin, status, Body::from(STREAM_ERROR_MARKER));
        }
    };

    let Some(message) = extract_message(&body, state.config.server.max_message_chars) else {
        tracing::warn!(body_bytes = body.len(), "[SERVER] 请求体无效或 message 为空");
        return cors_response(
            allow_origin,
            StatusCode::BAD_REQUEST,
            Body::from(STREAM_ERROR_MARKER),
        );
    };

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        request_id = %request_id,
        message_chars = message.chars().count(),
        "[SERVER] 接受翻译请求"
    );

    let stream = translate_stream(
        state.provider.clone(),
        message,
        state.config.stream.clone(),
        CancellationToken::new(),
        request_id.clone(),
    );

    let mut response = cors_response(allow_origin, StatusCode::OK, Body::from_stream(stream));
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// OPTIONS 预检处理器
pub async fn stream_options(State(state): State<AppState>) -> Response {
    cors_response(
        state.config.server.allow_origin(),
        StatusCode::NO_CONTENT,
        Body::empty(),
    )
}

/// 其他方法
pub async fn method_not_allowed(State(state): State<AppState>) -> impl IntoResponse {
    cors_response(
        state.config.server.allow_origin(),
        StatusCode::METHOD_NOT_ALLOWED,
        Body::from("Method not allowed"),
    )
}
