use serde::Serialize;

use super::chat::DEFAULT_MODEL;

/// `/v1/models` response body
#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelCard {
    pub id: &'static str,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

/// The fixed catalog advertised to callers. No upstream lookup is made.
pub fn available_models() -> ModelList {
    ModelList {
        object: "list",
        data: vec![ModelCard {
            id: DEFAULT_MODEL,
            object: "model",
            created: 1677610602,
            owned_by: "nvidia",
        }],
    }
}
