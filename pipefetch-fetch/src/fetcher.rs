//! The request client.
//!
//! A [`Fetcher`] resolves inputs against its base URL, merges headers, runs
//! the request through its interceptor chain over the shared transport,
//! logs the attempt and normalizes any failure into a single [`FetchError`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::Method;
use pipefetch_core::{
    merge_headers, DispatchError, FetchError, FetchLogger, FetcherConfig, FetcherOptions,
    HeaderRecord, HeadersInit,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::body::ParsedBody;
use crate::interceptor::InterceptorChain;
use crate::provider::TransportProvider;
use crate::response::ResponseEnvelope;
use crate::transport::{RequestDescriptor, Transport};

// ============================================================================
// Call Options
// ============================================================================

/// How [`Fetcher::with_headers`] combines new headers with the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMergeOptions {
    /// Merge over the current headers (`true`) or replace them (`false`).
    pub merge: bool,
}

impl HeaderMergeOptions {
    /// New entries overwrite matching ones, others are kept.
    pub fn merge() -> Self {
        Self { merge: true }
    }

    /// New entries replace the whole header set.
    pub fn replace() -> Self {
        Self { merge: false }
    }
}

impl Default for HeaderMergeOptions {
    fn default() -> Self {
        Self::merge()
    }
}

/// Per-call request options.
#[derive(Clone)]
pub struct RequestInit {
    /// HTTP method. Defaults to GET.
    pub method: Method,
    /// Headers merged over the instance headers.
    pub headers: Option<HeadersInit>,
    /// Request body.
    pub body: Option<Bytes>,
    /// Transport used for this call only, bypassing the shared transport and
    /// the interceptor chain.
    pub transport: Option<Arc<dyn Transport>>,
}

impl RequestInit {
    /// Creates a GET request with no headers or body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the per-call headers.
    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the transport for this call.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: None,
            body: None,
            transport: None,
        }
    }
}

impl fmt::Debug for RequestInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInit")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(Bytes::len))
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// HTTP request client bound to one configuration.
///
/// Safe to share behind an `Arc`; concurrent calls are independent.
pub struct Fetcher {
    config: FetcherConfig,
    interceptors: InterceptorChain,
    provider: Arc<TransportProvider>,
    logger: Option<Arc<dyn FetchLogger>>,
}

impl Fetcher {
    /// Creates a fetcher using the process-wide transport provider.
    ///
    /// # Panics
    ///
    /// Panics if the process-wide provider has not been built yet and the
    /// default transport cannot be created. See [`TransportProvider::global`].
    pub fn new(options: FetcherOptions) -> Self {
        Self::with_provider(options, TransportProvider::global())
    }

    /// Creates a fetcher dispatching through `provider`.
    pub fn with_provider(options: FetcherOptions, provider: Arc<TransportProvider>) -> Self {
        let logger = options.logger.clone();
        let config = FetcherConfig::resolve(options);
        let interceptors = InterceptorChain::from_config(&config);

        debug!(
            base_url = ?config.base_url,
            interceptors = ?interceptors.names(),
            "Created fetcher"
        );

        Self {
            config,
            interceptors,
            provider,
            logger,
        }
    }

    /// Returns the resolved configuration.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Returns the base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Returns the instance headers.
    pub fn headers(&self) -> &HeaderRecord {
        &self.config.headers
    }

    /// Returns the interceptor chain.
    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Returns the transport provider.
    pub fn provider(&self) -> &Arc<TransportProvider> {
        &self.provider
    }

    /// Returns the request logger, if any.
    pub fn logger(&self) -> Option<&Arc<dyn FetchLogger>> {
        self.logger.as_ref()
    }

    // ------------------------------------------------------------------------
    // Header mutators
    // ------------------------------------------------------------------------

    /// Merges `headers` into (or replaces) the instance headers.
    pub fn with_headers(
        &mut self,
        headers: impl Into<HeadersInit>,
        options: HeaderMergeOptions,
    ) -> &mut Self {
        let incoming = Some(headers.into());
        self.config.headers = if options.merge {
            let current = std::mem::take(&mut self.config.headers);
            merge_headers(Some(HeadersInit::Map(current)), incoming)
        } else {
            merge_headers(None, incoming)
        };
        self
    }

    /// Creates an independent fetcher with the same configuration, logger and
    /// provider, then applies `with_headers` to it only.
    ///
    /// The new instance builds its own interceptor chain, so it starts with
    /// an empty cache.
    pub fn clone_with_headers(
        &self,
        headers: impl Into<HeadersInit>,
        options: HeaderMergeOptions,
    ) -> Self {
        let mut fetcher_options = self.config.to_options();
        fetcher_options.logger = self.logger.clone();

        let mut fetcher = Self::with_provider(fetcher_options, self.provider.clone());
        fetcher.with_headers(headers, options);
        fetcher
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Resolves `input` against the base URL.
    ///
    /// Without a (non-empty) base URL the input must be absolute.
    pub fn resolve_url(&self, input: &str) -> Result<Url, FetchError> {
        let resolved = match self.config.base_url.as_deref().filter(|b| !b.is_empty()) {
            None => Url::parse(input),
            Some(base) => Url::parse(base).and_then(|base| base.join(input)),
        };

        resolved.map_err(|e| FetchError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })
    }

    /// Performs a request and returns the response with its body unread.
    #[instrument(skip_all, fields(input = %input))]
    pub async fn fetch(
        &self,
        input: &str,
        init: Option<RequestInit>,
    ) -> Result<ResponseEnvelope, FetchError> {
        let RequestInit {
            method,
            headers,
            body,
            transport,
        } = init.unwrap_or_default();

        let url = self.resolve_url(input)?;
        let headers = merge_headers(
            Some(HeadersInit::Map(self.config.headers.clone())),
            headers,
        );
        let request = RequestDescriptor {
            url,
            method,
            headers,
            body,
        };
        let name = request.name();

        self.log_info(&format!("Requesting {name}"));
        let started = Instant::now();
        let result = self.dispatch(request, transport).await;
        let elapsed = started.elapsed().as_millis();

        match result {
            Ok(response) => {
                self.log_info(&format!(
                    "Request {name} succeed with status {} in {elapsed}ms",
                    response.status().as_u16()
                ));
                Ok(response)
            }
            Err(error) => Err(self.normalize_failure(&name, elapsed, error)),
        }
    }

    /// Performs a request and decodes the body as JSON, falling back to text.
    pub async fn fetch_data(
        &self,
        input: &str,
        init: Option<RequestInit>,
    ) -> Result<Value, FetchError> {
        let response = self.fetch(input, init).await?;
        self.parse_body(response).await
    }

    /// Performs a request and deserializes the decoded body into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        input: &str,
        init: Option<RequestInit>,
    ) -> Result<T, FetchError> {
        let value = self.fetch_data(input, init).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a response body, returning parsed JSON or the raw text as a string.
    pub async fn parse_body(&self, response: ResponseEnvelope) -> Result<Value, FetchError> {
        let text = response.text().await?;

        self.log_debug("trying parsing json content");
        let parsed = ParsedBody::parse(text);
        if !parsed.is_json() {
            self.log_debug("body is not json, returning it as string");
        }
        Ok(parsed.into_value())
    }

    async fn dispatch(
        &self,
        request: RequestDescriptor,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<ResponseEnvelope, DispatchError> {
        let transport = match transport {
            Some(transport) => transport,
            None if self.interceptors.is_empty() => self.provider.get(),
            None => self.interceptors.compose(self.provider.get()),
        };
        transport.dispatch(request).await
    }

    /// Logs a failed call once and picks the error surfaced to the caller.
    fn normalize_failure(&self, name: &str, elapsed: u128, error: DispatchError) -> FetchError {
        let surfaced = match error {
            DispatchError::Unknown(message) => FetchError::Unknown(message),
            DispatchError::Status(status) => FetchError::Status(status),
            // The wrapper is never surfaced, only its cause.
            DispatchError::Wrapped { cause, .. } => *cause,
            DispatchError::Transport(error) => FetchError::Transport(error),
        };

        let message = match surfaced.status_code() {
            Some(status) => format!("Request {name} failed with status {status} after {elapsed}ms"),
            None => format!("Request {name} failed after {elapsed}ms"),
        };
        self.log_error(&surfaced, &message);
        surfaced
    }

    fn log_info(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.info(message);
        }
    }

    fn log_error(&self, error: &FetchError, message: &str) {
        if let Some(logger) = &self.logger {
            logger.error(error, message);
        }
    }

    fn log_debug(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.debug(message);
        }
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors.names())
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
