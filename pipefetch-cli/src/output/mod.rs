//! Output formatting for CLI.

mod json;
mod text;

use pipefetch_core::HeaderRecord;
use serde::Serialize;
use serde_json::Value;

pub use json::JsonFormatter;
pub use text::TextFormatter;

/// A completed response, ready to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutput {
    /// HTTP status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    /// Response headers.
    pub headers: HeaderRecord,
    /// Body decoded as JSON, or the raw text as a string.
    pub body: Value,
}
