//! Route table
//!
//! One chat path for every entry point, plus the static endpoints. Every
//! response leaves with `Access-Control-Allow-Origin: *`.

use crate::backends::UpstreamClient;
use crate::config::Config;
use crate::handlers;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
/// Serverless entry point kept for existing deployments.
pub const LEGACY_CHAT_PATH: &str = "/api/chat";

pub fn build_router(config: Arc<Config>, client: UpstreamClient) -> Router {
    // Chat bodies go upstream untouched, inline images included, so no size cap.
    let chat = post(handlers::chat_completions_handler)
        .options(handlers::chat_preflight_handler)
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/v1/models", get(handlers::models_handler))
        .route(CHAT_COMPLETIONS_PATH, chat.clone())
        .route(LEGACY_CHAT_PATH, chat)
        .layer(Extension(config))
        .layer(Extension(client))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}
