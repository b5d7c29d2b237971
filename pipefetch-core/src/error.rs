//! Error types for Pipefetch.
//!
//! [`FetchError`] is what callers of the client see. [`DispatchError`] is the
//! richer shape flowing between transports and interceptors; the client
//! normalizes it into a [`FetchError`] before returning.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::headers::HeaderRecord;

// ============================================================================
// Transport Error
// ============================================================================

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection could not be established (DNS, refused, TLS).
    Connect,
    /// The request or connection timed out.
    Timeout,
    /// The request could not be built or sent.
    Request,
    /// Reading the response body failed.
    Body,
    /// Redirect policy violated.
    Redirect,
    /// The transport itself could not be constructed.
    Build,
    /// Anything else.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::Redirect => "redirect",
            Self::Build => "build",
            Self::Other => "transport",
        };
        f.write_str(name)
    }
}

/// A network, DNS or protocol failure. Carries no status code.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error without an underlying source.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true for failures a retry might cure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout
        )
    }
}

// ============================================================================
// Status Error
// ============================================================================

/// A failure classified by HTTP status.
///
/// Carries the status code plus the failing response's body and headers.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message} (status {status_code})")]
#[serde(rename_all = "camelCase")]
pub struct StatusError {
    /// Human-readable message.
    pub message: String,
    /// HTTP status code of the failing response.
    pub status_code: u16,
    /// Response body: parsed JSON when possible, else the raw text as a string.
    pub body: serde_json::Value,
    /// Response headers.
    pub headers: HeaderRecord,
}

impl StatusError {
    /// Creates a status error with an empty body and no headers.
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
            body: serde_json::Value::Null,
            headers: HeaderRecord::new(),
        }
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// Sets the response headers.
    pub fn with_headers(mut self, headers: HeaderRecord) -> Self {
        self.headers = headers;
        self
    }
}

// ============================================================================
// Fetch Error
// ============================================================================

/// Error returned by the client.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, DNS or protocol failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Failure carrying an HTTP status code.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// A failure value with no recognizable structure.
    #[error("Unknown failure: {0}")]
    Unknown(String),

    /// The request input could not be turned into an absolute URL.
    #[error("Invalid URL {input:?}: {reason}")]
    InvalidUrl {
        /// The input as given by the caller.
        input: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A parsed body did not match the requested type.
    #[error("Failed to decode body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Returns the HTTP status code, if this is a status failure.
    pub fn status_code(&self) -> Option<u16> {
        self.as_status().map(|e| e.status_code)
    }

    /// Returns the status error, if this is one.
    pub fn as_status(&self) -> Option<&StatusError> {
        match self {
            Self::Status(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the transport error, if this is one.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Dispatch Error
// ============================================================================

/// Failure produced by a transport or an interceptor.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Structured failure without status or cause.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Failure exposing a status code directly.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Generic outer failure wrapping the structured cause.
    #[error("{message}")]
    Wrapped {
        /// Outer message (e.g. "fetch failed").
        message: String,
        /// The structured failure that is surfaced to the caller.
        #[source]
        cause: Box<FetchError>,
    },

    /// Failure value with no structure at all.
    #[error("{0}")]
    Unknown(String),
}

impl DispatchError {
    /// Wraps a structured cause in a generic outer failure.
    pub fn wrap(message: impl Into<String>, cause: impl Into<FetchError>) -> Self {
        Self::Wrapped {
            message: message.into(),
            cause: Box::new(cause.into()),
        }
    }

    /// Returns the status code exposed directly by this failure.
    ///
    /// A wrapped cause is not inspected.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(e) => Some(e.status_code),
            _ => None,
        }
    }
}

// ============================================================================
// Config Error
// ============================================================================

/// Error loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL is not an absolute URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_builder() {
        let err = StatusError::new("Response Error", 400).with_body(json!({"data": "x"}));
        assert_eq!(err.status_code, 400);
        assert_eq!(err.body, json!({"data": "x"}));
        assert_eq!(err.to_string(), "Response Error (status 400)");
    }

    #[test]
    fn test_fetch_error_accessors() {
        let status: FetchError = StatusError::new("Response Error", 404).into();
        assert_eq!(status.status_code(), Some(404));
        assert!(status.as_transport().is_none());

        let transport: FetchError =
            TransportError::new(TransportErrorKind::Connect, "refused").into();
        assert_eq!(transport.status_code(), None);
        assert_eq!(
            transport.as_transport().map(TransportError::kind),
            Some(TransportErrorKind::Connect)
        );
    }

    #[test]
    fn test_dispatch_wrap_hides_status() {
        let wrapped = DispatchError::wrap("fetch failed", StatusError::new("Response Error", 500));
        assert_eq!(wrapped.status_code(), None);
        assert_eq!(wrapped.to_string(), "fetch failed");

        let DispatchError::Wrapped { cause, .. } = wrapped else {
            panic!("expected a wrapped error");
        };
        assert_eq!(cause.status_code(), Some(500));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(TransportError::new(TransportErrorKind::Timeout, "slow").is_retryable());
        assert!(!TransportError::new(TransportErrorKind::Body, "cut").is_retryable());
    }
}
