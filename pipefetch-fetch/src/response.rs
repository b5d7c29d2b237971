//! Response envelope returned by transports and the fetcher.
//!
//! The envelope carries status, headers and final URL, plus a body that has
//! not been read yet. Bodies coming off the network stay streamed until a
//! reader consumes them; interceptors that need the bytes (cache,
//! throw-on-error) buffer them.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use http::{HeaderMap, StatusCode};
use pipefetch_core::{header_map_to_record, HeaderRecord, TransportError};
use serde::de::DeserializeOwned;
use url::Url;

// ============================================================================
// Response Body
// ============================================================================

/// A response body, either already in memory or still streaming.
pub struct ResponseBody {
    inner: BodyInner,
}

enum BodyInner {
    Buffered(Bytes),
    Streaming(BoxStream<'static, Result<Bytes, TransportError>>),
}

impl ResponseBody {
    /// An empty body.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body already held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            inner: BodyInner::Buffered(bytes.into()),
        }
    }

    /// A body read lazily from a stream of chunks.
    pub fn from_stream(stream: BoxStream<'static, Result<Bytes, TransportError>>) -> Self {
        Self {
            inner: BodyInner::Streaming(stream),
        }
    }

    /// Returns true if the body is held in memory.
    pub fn is_buffered(&self) -> bool {
        matches!(self.inner, BodyInner::Buffered(_))
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self.inner {
            BodyInner::Buffered(bytes) => Ok(bytes),
            BodyInner::Streaming(mut chunks) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = chunks.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Turns the body into a chunk stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, TransportError>> {
        match self.inner {
            BodyInner::Buffered(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            BodyInner::Streaming(chunks) => chunks,
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            BodyInner::Buffered(bytes) => f
                .debug_struct("ResponseBody")
                .field("buffered", &bytes.len())
                .finish(),
            BodyInner::Streaming(_) => f
                .debug_struct("ResponseBody")
                .field("streaming", &true)
                .finish(),
        }
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Status, headers, final URL and unread body of a response.
#[derive(Debug)]
pub struct ResponseEnvelope {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: ResponseBody,
}

impl ResponseEnvelope {
    /// Creates an envelope.
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            url,
            body,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers as a plain record.
    pub fn header_record(&self) -> HeaderRecord {
        header_map_to_record(&self.headers)
    }

    /// Returns the final URL of the response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns true if the body is held in memory.
    pub fn is_body_buffered(&self) -> bool {
        self.body.is_buffered()
    }

    /// Splits the envelope into its head and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Url, ResponseBody) {
        (self.status, self.headers, self.url, self.body)
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        self.body.bytes().await
    }

    /// Reads the whole body as text. Invalid UTF-8 is replaced.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.body.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the whole body and deserializes it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, pipefetch_core::FetchError> {
        let bytes = self.body.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turns the body into a chunk stream.
    pub fn bytes_stream(self) -> BoxStream<'static, Result<Bytes, TransportError>> {
        self.body.into_stream()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pipefetch_core::TransportErrorKind;
    use serde_json::{json, Value};

    fn url() -> Url {
        Url::parse("http://127.0.0.1:3000/").unwrap()
    }

    #[tokio::test]
    async fn test_streaming_body_is_concatenated() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"data\":")),
            Ok(Bytes::from_static(b"\"hello\"}")),
        ])
        .boxed();
        let response = ResponseEnvelope::new(
            StatusCode::CREATED,
            HeaderMap::new(),
            url(),
            ResponseBody::from_stream(chunks),
        );

        assert!(!response.is_body_buffered());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"data": "hello"}));
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::new(TransportErrorKind::Body, "connection reset")),
        ])
        .boxed();
        let body = ResponseBody::from_stream(chunks);

        let err = body.bytes().await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Body);
    }

    #[tokio::test]
    async fn test_buffered_text() {
        let response = ResponseEnvelope::new(
            StatusCode::OK,
            HeaderMap::new(),
            url(),
            ResponseBody::from_bytes("plain text"),
        );
        assert!(response.is_success());
        assert_eq!(response.text().await.unwrap(), "plain text");
    }
}
