//! Transports: the engines that actually put a request on the wire.
//!
//! A [`Transport`] takes a fully resolved [`RequestDescriptor`] and returns a
//! [`ResponseEnvelope`] or a [`DispatchError`]. [`ReqwestTransport`] is the
//! pooled default, built once from [`TransportSettings`] and shared by every
//! fetcher that references it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use pipefetch_core::{DispatchError, HeaderRecord, TransportError, TransportErrorKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::response::{ResponseBody, ResponseEnvelope};

/// User agent string for Pipefetch.
const USER_AGENT: &str = concat!("pipefetch/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Request Descriptor
// ============================================================================

/// A fully resolved request. Built per call, never persisted.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Absolute target URL.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Merged request headers.
    pub headers: HeaderRecord,
    /// Request body.
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Creates a body-less request with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: HeaderRecord::new(),
            body: None,
        }
    }

    /// Returns `"<METHOD> <URL>"`.
    pub fn name(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Converts the header record into a `HeaderMap`.
    pub fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Request,
                    format!("invalid header name {name:?}"),
                )
                .with_source(e)
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Request,
                    format!("invalid value for header {name:?}"),
                )
                .with_source(e)
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Issues requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response head with an unread body.
    async fn dispatch(&self, request: RequestDescriptor)
        -> Result<ResponseEnvelope, DispatchError>;
}

// ============================================================================
// Transport Settings
// ============================================================================

/// Pooling parameters for the default transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportSettings {
    /// How long an idle pooled connection is kept, in milliseconds.
    #[serde(default = "default_keep_alive_timeout_ms")]
    pub keep_alive_timeout_ms: u64,
    /// Maximum idle connections kept per host.
    #[serde(default = "default_connections")]
    pub connections: usize,
    /// Connection establishment timeout, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout (headers and body), in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Whether HTTP/2 may be negotiated.
    #[serde(default = "default_true")]
    pub allow_http2: bool,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            keep_alive_timeout_ms: default_keep_alive_timeout_ms(),
            connections: default_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            allow_http2: default_true(),
            user_agent: default_user_agent(),
        }
    }
}

impl TransportSettings {
    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the whole-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Restricts the transport to HTTP/1.1.
    pub fn http1_only(mut self) -> Self {
        self.allow_http2 = false;
        self
    }

    /// Builds the pooled transport. Call once and share the result.
    pub fn build(&self) -> Result<ReqwestTransport, TransportError> {
        let keep_alive = Duration::from_millis(self.keep_alive_timeout_ms);

        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .pool_idle_timeout(keep_alive)
            .pool_max_idle_per_host(self.connections)
            .tcp_keepalive(keep_alive);

        if !self.allow_http2 {
            builder = builder.http1_only();
        }

        let client = builder.build().map_err(|e| {
            TransportError::new(TransportErrorKind::Build, "failed to build HTTP client")
                .with_source(e)
        })?;

        debug!(settings = ?self, "Built pooled transport");
        Ok(ReqwestTransport::from_client(client))
    }
}

fn default_keep_alive_timeout_ms() -> u64 {
    10_000
}

fn default_connections() -> usize {
    50
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Pooled transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn dispatch(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, DispatchError> {
        let headers = request.header_map()?;

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(from_reqwest)?;
        debug!(status = %response.status(), "Response received");

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(from_reqwest))
            .boxed();

        Ok(ResponseEnvelope::new(
            status,
            headers,
            url,
            ResponseBody::from_stream(body),
        ))
    }
}

/// Classifies a reqwest failure.
pub(crate) fn from_reqwest(err: reqwest::Error) -> TransportError {
    let kind = if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else if err.is_redirect() {
        TransportErrorKind::Redirect
    } else if err.is_builder() || err.is_request() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, err.to_string()).with_source(err)
}

// ============================================================================
// Tests
// ============================================================================
