use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Envelope returned by `/analyze/prompt`; only `result` is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Error body the analysis agents emit alongside a failing status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl BackendErrorBody {
    /// Agents report failures inside a 2xx reply. A JSON object holding a
    /// string `error` and nothing but an optional `details` is one of those.
    pub fn from_success_body(body: &str) -> Option<Self> {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body.trim()) else {
            return None;
        };
        if !map.get("error").is_some_and(Value::is_string)
            || map.keys().any(|key| key != "error" && key != "details")
        {
            return None;
        }
        serde_json::from_value(Value::Object(map)).ok()
    }

    pub fn summary(&self) -> String {
        match &self.details {
            None | Some(Value::Null) => self.error.clone(),
            Some(Value::String(details)) => format!("{}: {details}", self.error),
            Some(details) => format!("{}: {details}", self.error),
        }
    }
}

/// Whatever the results panel shows for a completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultPayload {
    Text(String),
    Json(Value),
}

impl ResultPayload {
    /// Interprets a raw response body. Blank bodies and JSON `null` carry no result.
    pub fn from_body(body: &str) -> Option<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Null) => None,
            Ok(value) => Some(ResultPayload::Json(value)),
            Err(_) => Some(ResultPayload::Text(body.to_string())),
        }
    }

    /// Text exactly as the results panel and downloads present it.
    pub fn render(&self) -> String {
        match self {
            ResultPayload::Text(text) => text.clone(),
            ResultPayload::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    /// Human-readable summary carried inside some JSON replies (`response`, `message`).
    pub fn headline(&self) -> Option<&str> {
        let ResultPayload::Json(Value::Object(map)) = self else {
            return None;
        };
        ["response", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
    }
}
