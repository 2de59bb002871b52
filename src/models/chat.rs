use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MODEL: &str = "meta/llama-3.1-405b-instruct";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 1024;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Normalized chat-completion request, the only body sent upstream.
///
/// Fields hold raw JSON values: whatever type the caller sent is forwarded
/// as-is and the upstream decides whether to accept it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub model: Value,
    pub messages: Value,
    pub stream: Value,
    pub temperature: Value,
    pub max_tokens: Value,
    pub top_p: Value,
}

impl UpstreamPayload {
    /// Streaming mode is selected only by a literal `true`.
    pub fn is_streaming(&self) -> bool {
        self.stream.as_bool().unwrap_or(false)
    }

    pub fn model_name(&self) -> &str {
        self.model.as_str().unwrap_or("unknown")
    }
}
