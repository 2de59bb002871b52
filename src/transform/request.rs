use crate::error::{ProxyError, ProxyResult};
use crate::models::chat::{
    UpstreamPayload, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
use serde_json::{json, Map, Value};

/// Build the upstream payload from a caller body.
///
/// Every recognized field keeps the caller's value when the key is present
/// (including an explicit `null`) and falls back to its default otherwise.
/// Values are never coerced or validated; unrecognized keys are not forwarded.
pub fn normalize(body: Value) -> ProxyResult<UpstreamPayload> {
    let mut fields = match body {
        Value::Object(fields) => fields,
        other => {
            return Err(ProxyError::InvalidRequest(format!(
                "request body must be a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    Ok(UpstreamPayload {
        model: take_or(&mut fields, "model", json!(DEFAULT_MODEL)),
        messages: take_or(&mut fields, "messages", json!([])),
        stream: take_or(&mut fields, "stream", json!(false)),
        temperature: take_or(&mut fields, "temperature", json!(DEFAULT_TEMPERATURE)),
        max_tokens: take_or(&mut fields, "max_tokens", json!(DEFAULT_MAX_TOKENS)),
        top_p: take_or(&mut fields, "top_p", json!(DEFAULT_TOP_P)),
    })
}

fn take_or(fields: &mut Map<String, Value>, key: &str, default: Value) -> Value {
    fields.remove(key).unwrap_or(default)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
