//! Request log sink.
//!
//! A fetcher reports each request attempt to an optional [`FetchLogger`].
//! Without one, nothing is reported.

use std::error::Error;

/// Target used by [`TracingLogger`] events.
pub const REQUEST_LOG_TARGET: &str = "pipefetch::request";

/// Sink for per-request log lines.
pub trait FetchLogger: Send + Sync {
    /// Informational line (request start, request success).
    fn info(&self, message: &str);

    /// Failure line, with the failure being reported.
    fn error(&self, error: &(dyn Error + 'static), message: &str);

    /// Diagnostic line.
    fn debug(&self, message: &str);
}

/// Forwards request log lines to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl FetchLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: REQUEST_LOG_TARGET, "{message}");
    }

    fn error(&self, error: &(dyn Error + 'static), message: &str) {
        tracing::error!(target: REQUEST_LOG_TARGET, error = %error, "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: REQUEST_LOG_TARGET, "{message}");
    }
}
