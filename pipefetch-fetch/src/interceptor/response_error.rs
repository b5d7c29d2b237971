//! Throw-on-error step.
//!
//! Turns responses with a status of 400 or above into a wrapped
//! [`StatusError`] carrying the status, decoded body and headers.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use pipefetch_core::{header_map_to_record, DispatchError, StatusError};
use serde_json::Value;
use tracing::{debug, warn};

use super::Interceptor;
use crate::body::ParsedBody;
use crate::response::ResponseEnvelope;
use crate::transport::{RequestDescriptor, Transport};

const STATUS_ERROR_MESSAGE: &str = "Response Error";
const WRAPPER_MESSAGE: &str = "fetch failed";

/// Classifies non-success responses as failures.
#[derive(Debug, Clone, Default)]
pub struct ResponseErrorInterceptor;

impl ResponseErrorInterceptor {
    /// Creates the step.
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for ResponseErrorInterceptor {
    fn name(&self) -> &'static str {
        "response_error"
    }

    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(ResponseErrorTransport { next })
    }
}

struct ResponseErrorTransport {
    next: Arc<dyn Transport>,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("json"))
}

#[async_trait]
impl Transport for ResponseErrorTransport {
    async fn dispatch(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, DispatchError> {
        let response = self.next.dispatch(request).await?;
        let status = response.status();
        if status.as_u16() < 400 {
            return Ok(response);
        }

        let json = is_json(response.headers());
        let headers = response.header_record();
        let body = match response.text().await {
            Ok(text) if json => ParsedBody::parse(text).into_value(),
            Ok(text) => Value::String(text),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Failed to read error response body");
                Value::Null
            }
        };

        debug!(status = status.as_u16(), "Classifying response as failure");
        let error = StatusError::new(STATUS_ERROR_MESSAGE, status.as_u16())
            .with_body(body)
            .with_headers(headers);
        Err(DispatchError::wrap(WRAPPER_MESSAGE, error))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseBody;
    use crate::test_support::{json_response, ok_response, ScriptedTransport};
    use futures::{stream, StreamExt};
    use http::{Method, StatusCode};
    use pipefetch_core::{FetchError, TransportError, TransportErrorKind};
    use serde_json::json;
    use url::Url;

    fn request() -> RequestDescriptor {
        RequestDescriptor::new(Method::POST, Url::parse("http://127.0.0.1:3000/error").unwrap())
    }

    fn unwrap_status(err: DispatchError) -> StatusError {
        match err {
            DispatchError::Wrapped { message, cause } => {
                assert_eq!(message, "fetch failed");
                match *cause {
                    FetchError::Status(status) => status,
                    other => panic!("unexpected cause: {other:?}"),
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let inner = Arc::new(ScriptedTransport::always(|req| {
            json_response(req, StatusCode::CREATED, &json!({"data": "hello"}))
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);

        let response = transport.dispatch(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_json_error_body_is_decoded() {
        let inner = Arc::new(ScriptedTransport::always(|req| {
            json_response(req, StatusCode::BAD_REQUEST, &json!({"data": "error occurred"}))
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);

        let err = unwrap_status(transport.dispatch(request()).await.unwrap_err());
        assert_eq!(err.message, "Response Error");
        assert_eq!(err.status_code, 400);
        assert_eq!(err.body, json!({"data": "error occurred"}));
        assert_eq!(
            err.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_text_error_body_is_kept_as_string() {
        let inner = Arc::new(ScriptedTransport::always(|req| {
            ok_response(req, StatusCode::NOT_FOUND, "{\"looks\":\"like json\"}")
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);

        let err = unwrap_status(transport.dispatch(request()).await.unwrap_err());
        assert_eq!(err.status_code, 404);
        assert_eq!(err.body, json!("{\"looks\":\"like json\"}"));
    }

    #[tokio::test]
    async fn test_redirect_statuses_are_not_failures() {
        let inner = Arc::new(ScriptedTransport::always(|req| {
            ok_response(req, StatusCode::NOT_MODIFIED, "")
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);
        assert!(transport.dispatch(request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreadable_error_body_keeps_status() {
        let inner = Arc::new(ScriptedTransport::always(|req| {
            let chunks = stream::iter(vec![Err(TransportError::new(
                TransportErrorKind::Body,
                "connection reset",
            ))])
            .boxed();
            Ok(ResponseEnvelope::new(
                StatusCode::BAD_GATEWAY,
                HeaderMap::new(),
                req.url.clone(),
                ResponseBody::from_stream(chunks),
            ))
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);

        let err = unwrap_status(transport.dispatch(request()).await.unwrap_err());
        assert_eq!(err.status_code, 502);
        assert!(err.body.is_null());
    }

    #[tokio::test]
    async fn test_transport_errors_are_untouched() {
        let inner = Arc::new(ScriptedTransport::always(|_| {
            Err(TransportError::new(TransportErrorKind::Connect, "refused").into())
        }));
        let transport = ResponseErrorInterceptor::new().wrap(inner);

        let err = transport.dispatch(request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }
}
