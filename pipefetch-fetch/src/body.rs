//! Best-effort body decoding shared by the fetcher and the throw-on-error step.

use serde_json::Value;

/// A response body decoded as JSON when possible, else kept as text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// The text was valid JSON.
    Json(Value),
    /// The text was not JSON.
    Text(String),
}

impl ParsedBody {
    /// Tries JSON first and falls back to the raw text. Never fails.
    pub fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }

    /// Returns true if the text parsed as JSON.
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Converts to a JSON value; text becomes a string value.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}
