//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ResponseOutput;
    use pipefetch_core::HeaderRecord;
    use serde_json::json;

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_response_output_shape() {
        let output = ResponseOutput {
            status: 201,
            url: "http://127.0.0.1:3000/".to_string(),
            headers: HeaderRecord::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            body: json!({"data": "hello"}),
        };

        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(false).format(&output).unwrap()).unwrap();
        assert_eq!(value["status"], 201);
        assert_eq!(value["headers"]["content-type"], "application/json");
        assert_eq!(value["body"]["data"], "hello");
    }
}
