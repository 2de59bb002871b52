//! Chat completions endpoint (/v1/chat/completions)

use crate::backends::UpstreamClient;
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};
use crate::streaming;
use crate::transform;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

pub async fn chat_completions_handler(
    Extension(config): Extension<Arc<Config>>,
    Extension(client): Extension<UpstreamClient>,
    body: Bytes,
) -> ProxyResult<Response> {
    let raw_json: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse request as JSON: {}", e);
        tracing::debug!("Raw request body: {}", String::from_utf8_lossy(&body));
        ProxyError::InvalidRequest(format!("Invalid JSON: {}", e))
    })?;

    if config.debug && config.log_raw_json {
        tracing::debug!(
            "Raw request JSON: {}",
            serde_json::to_string_pretty(&raw_json).unwrap_or_default()
        );
    }

    let payload = transform::normalize(raw_json)?;
    let is_streaming = payload.is_streaming();

    tracing::debug!("Received chat request for model: {}", payload.model_name());
    tracing::debug!("Streaming: {}", is_streaming);

    if config.verbose {
        tracing::trace!(
            "Upstream payload: {}",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        );
    }

    if is_streaming {
        let sse_stream = streaming::relay(client, payload, config.stream_idle_timeout());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        return Ok((headers, Body::from_stream(sse_stream)).into_response());
    }

    let upstream_body = client.complete(&payload).await.map_err(|e| {
        tracing::error!("Chat completion failed: {}", e);
        e
    })?;

    if config.verbose {
        tracing::trace!(
            "Upstream response: {}",
            serde_json::to_string_pretty(&upstream_body).unwrap_or_default()
        );
    }

    Ok(Json(upstream_body).into_response())
}

/// CORS preflight for the chat endpoint.
pub async fn chat_preflight_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
}
