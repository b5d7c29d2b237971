//! Text output formatting.

use pipefetch_core::HeaderRecord;
use serde_json::Value;

use super::ResponseOutput;

/// Human-readable formatter.
#[derive(Debug, Default)]
pub struct TextFormatter;

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new() -> Self {
        Self
    }

    /// Formats a response. Status line and headers are only shown with
    /// `include_head`.
    pub fn format_response(&self, response: &ResponseOutput, include_head: bool) -> String {
        let mut lines = Vec::new();

        if include_head {
            lines.push(format!("{} {}", response.status, response.url));
            lines.extend(self.format_headers(&response.headers));
            lines.push(String::new());
        }

        lines.push(self.format_body(&response.body));
        lines.join("\n")
    }

    /// Formats headers as `name: value` lines.
    pub fn format_headers(&self, headers: &HeaderRecord) -> Vec<String> {
        headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect()
    }

    /// Formats a decoded body. Text is printed raw, JSON pretty-printed.
    pub fn format_body(&self, body: &Value) -> String {
        match body {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: Value) -> ResponseOutput {
        ResponseOutput {
            status: 200,
            url: "http://127.0.0.1:3000/x".to_string(),
            headers: HeaderRecord::from([
                ("content-type".to_string(), "text/plain".to_string()),
                ("x-id".to_string(), "7".to_string()),
            ]),
            body,
        }
    }

    #[test]
    fn test_text_body_is_printed_raw() {
        let formatter = TextFormatter::new();
        assert_eq!(formatter.format_body(&json!("plain text")), "plain text");
    }

    #[test]
    fn test_json_body_is_pretty() {
        let formatter = TextFormatter::new();
        let output = formatter.format_body(&json!({"data": "hello"}));
        assert_eq!(output, "{\n  \"data\": \"hello\"\n}");
    }

    #[test]
    fn test_body_only_by_default() {
        let formatter = TextFormatter::new();
        assert_eq!(formatter.format_response(&response(json!("ok")), false), "ok");
    }

    #[test]
    fn test_head_lists_status_and_headers() {
        let formatter = TextFormatter::new();
        let output = formatter.format_response(&response(json!("ok")), true);
        assert_eq!(
            output,
            "200 http://127.0.0.1:3000/x\ncontent-type: text/plain\nx-id: 7\n\nok"
        );
    }
}
