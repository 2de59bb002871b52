use crate::models::catalog::{available_models, ModelList};
use axum::Json;

pub async fn models_handler() -> Json<ModelList> {
    Json(available_models())
}
