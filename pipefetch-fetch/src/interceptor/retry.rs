//! Retry step.
//!
//! Re-issues idempotent requests that failed at the transport level or came
//! back with a retryable status, with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::RETRY_AFTER;
use pipefetch_core::{DispatchError, RetryOptions};
use tracing::{debug, warn};

use super::Interceptor;
use crate::response::ResponseEnvelope;
use crate::transport::{RequestDescriptor, Transport};

/// Retries failed attempts before anything downstream sees them.
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    options: RetryOptions,
}

impl RetryInterceptor {
    /// Creates the step.
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Returns the step options.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }
}

impl Interceptor for RetryInterceptor {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(RetryTransport {
            next,
            options: self.options.clone(),
        })
    }
}

struct RetryTransport {
    next: Arc<dyn Transport>,
    options: RetryOptions,
}

impl RetryTransport {
    /// Backoff for the given retry (1-based), capped at `max_timeout`.
    fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.options.timeout_factor.powi(exponent);
        Duration::try_from_secs_f64(self.options.min_timeout().as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
            .min(self.options.max_timeout())
    }

    /// Server-requested delay, capped at `max_timeout`.
    fn retry_after(&self, response: &ResponseEnvelope) -> Option<Duration> {
        if !self.options.retry_after {
            return None;
        }
        let secs: u64 = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())?;
        Some(Duration::from_secs(secs).min(self.options.max_timeout()))
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn dispatch(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, DispatchError> {
        if !self.options.allows_method(request.method.as_str()) {
            return self.next.dispatch(request).await;
        }

        let mut retries = 0;
        loop {
            let result = self.next.dispatch(request.clone()).await;
            if retries >= self.options.max_retries {
                return result;
            }

            let delay = match &result {
                Ok(response)
                    if self
                        .options
                        .status_codes
                        .contains(&response.status().as_u16()) =>
                {
                    let delay = self
                        .retry_after(response)
                        .unwrap_or_else(|| self.delay_for_retry(retries + 1));
                    warn!(
                        request = %request.name(),
                        status = %response.status(),
                        delay_ms = delay.as_millis(),
                        "Retryable status, retrying"
                    );
                    Some(delay)
                }
                Err(DispatchError::Transport(error)) if error.is_retryable() => {
                    let delay = self.delay_for_retry(retries + 1);
                    warn!(
                        request = %request.name(),
                        error = %error,
                        delay_ms = delay.as_millis(),
                        "Request failed, retrying"
                    );
                    Some(delay)
                }
                _ => None,
            };

            let Some(delay) = delay else {
                if retries > 0 {
                    debug!(request = %request.name(), retries, "Finished after retries");
                }
                return result;
            };

            drop(result);
            retries += 1;
            tokio::time::sleep(delay).await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
