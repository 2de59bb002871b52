use axum::Json;
use serde_json::{json, Value};

/// Liveness probe. Never touches the upstream.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "status": "NIM Proxy is running" }))
}
