use serde::{Deserialize, Serialize};

/// Error body the access-control service returns alongside failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub error: String,
}

/// Extracts the human-readable detail from a failed response body.
///
/// Prefers the `error` field of a JSON body and falls back to the raw text.
pub fn service_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}
