//! Shared helpers for unit tests: a scripted transport and a recording logger.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::Mutex;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use pipefetch_core::{DispatchError, FetchLogger};

use crate::response::{ResponseBody, ResponseEnvelope};
use crate::transport::{RequestDescriptor, Transport};

pub(crate) type Outcome = Result<ResponseEnvelope, DispatchError>;
type Responder = Box<dyn Fn(&RequestDescriptor) -> Outcome + Send + Sync>;

/// Transport answering from a script and recording every request it sees.
pub(crate) struct ScriptedTransport {
    fallback: Option<Responder>,
    script: Mutex<VecDeque<Responder>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    /// Answers every request with `responder`.
    pub(crate) fn always(
        responder: impl Fn(&RequestDescriptor) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            fallback: Some(Box::new(responder)),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers requests with `responders` in order, then fails.
    pub(crate) fn sequence(responders: Vec<Responder>) -> Self {
        Self {
            fallback: None,
            script: Mutex::new(responders.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: RequestDescriptor) -> Outcome {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(responder), _) => responder(&request),
            (None, Some(fallback)) => fallback(&request),
            (None, None) => Err(DispatchError::Unknown("script exhausted".to_string())),
        }
    }
}

/// Boxes a responder for [`ScriptedTransport::sequence`].
pub(crate) fn step(
    responder: impl Fn(&RequestDescriptor) -> Outcome + Send + Sync + 'static,
) -> Responder {
    Box::new(responder)
}

/// A buffered text response.
pub(crate) fn ok_response(request: &RequestDescriptor, status: StatusCode, body: &str) -> Outcome {
    Ok(ResponseEnvelope::new(
        status,
        HeaderMap::new(),
        request.url.clone(),
        ResponseBody::from_bytes(body.to_string()),
    ))
}

/// A buffered JSON response.
pub(crate) fn json_response(
    request: &RequestDescriptor,
    status: StatusCode,
    body: &serde_json::Value,
) -> Outcome {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(ResponseEnvelope::new(
        status,
        headers,
        request.url.clone(),
        ResponseBody::from_bytes(body.to_string()),
    ))
}

/// A buffered response with explicit headers.
pub(crate) fn response_with_headers(
    request: &RequestDescriptor,
    status: StatusCode,
    headers: &[(&'static str, &'static str)],
    body: &str,
) -> Outcome {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, HeaderValue::from_static(value));
    }
    Ok(ResponseEnvelope::new(
        status,
        map,
        request.url.clone(),
        ResponseBody::from_bytes(body.to_string()),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Info,
    Error,
    Debug,
}

/// Logger that keeps every line it is given.
#[derive(Default)]
pub(crate) struct RecordingLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub(crate) fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }
}

impl FetchLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push((Level::Info, message.to_string()));
    }

    fn error(&self, _error: &(dyn Error + 'static), message: &str) {
        self.lines.lock().unwrap().push((Level::Error, message.to_string()));
    }

    fn debug(&self, message: &str) {
        self.lines.lock().unwrap().push((Level::Debug, message.to_string()));
    }
}
