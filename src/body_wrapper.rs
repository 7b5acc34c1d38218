//! Body buffering for axum requests and responses.
//!
//! This module provides the axum side of [`RequestView`] and [`ResponseView`]:
//! bodies are collected into memory so they can be logged, and an identical
//! buffered body is handed on so downstream consumers still see the full
//! content.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use axum::http::response::Parts;
use axum::response::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::error;

use crate::error::BodyReadError;
use crate::http::{RequestView, ResponseView};
use crate::types::{LoggedResult, ResponseShape};

/// Collect a whole body into memory.
///
/// # Examples
///
/// ```rust
/// use loggable::body_wrapper::buffer_body;
/// use axum::body::Body;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = buffer_body(Body::from("Hello, World!")).await?;
/// assert_eq!(bytes, "Hello, World!");
/// # Ok(())
/// # }
/// ```
pub async fn buffer_body(body: Body) -> Result<Bytes, BodyReadError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| BodyReadError::StreamError(e.to_string()))
}

/// An axum request whose body can be read without consuming it.
#[derive(Debug)]
pub struct BufferedRequest {
    request: Request,
}

impl BufferedRequest {
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn into_inner(self) -> Request {
        self.request
    }
}

impl RequestView for BufferedRequest {
    fn method(&self) -> &str {
        self.request.method().as_str()
    }

    /// The request path, without the query string.
    fn uri(&self) -> String {
        self.request.uri().path().to_owned()
    }

    fn headers(&self) -> Vec<(String, Option<String>)> {
        let headers = self.request.headers();
        headers
            .keys()
            .map(|name| {
                let value = headers
                    .get_all(name)
                    .iter()
                    .last()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
                (name.as_str().to_owned(), value)
            })
            .collect()
    }

    async fn read_body(&mut self) -> Result<Bytes, BodyReadError> {
        let body = mem::replace(self.request.body_mut(), Body::empty());
        let bytes = buffer_body(body).await?;
        *self.request.body_mut() = Body::from(bytes.clone());
        Ok(bytes)
    }
}

#[derive(Debug, Default)]
struct BufferState {
    captured: Option<Bytes>,
    restored: Option<Bytes>,
}

/// Holds a captured response body until it is restored onto the response.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct ResponseBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the body produced by the handler.
    pub fn capture(&self, body: Bytes) {
        self.lock().captured = Some(body);
    }

    pub fn is_restored(&self) -> bool {
        self.lock().restored.is_some()
    }

    /// The body to send to the client: whatever was restored, otherwise the
    /// captured body, otherwise empty.
    pub fn into_body(self) -> Body {
        let body = {
            let mut state = self.lock();
            state.restored.take().or_else(|| state.captured.take())
        };
        match body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResponseView for ResponseBuffer {
    fn restore(&mut self) {
        let mut state = self.lock();
        let body = state.captured.take().unwrap_or_default();
        state.restored = Some(body);
    }
}

/// A handler response whose body has been moved into a [`ResponseBuffer`].
#[derive(Debug)]
pub struct CapturedResponse {
    parts: Parts,
    body: Bytes,
}

impl CapturedResponse {
    /// Buffer the body of `response`, storing a copy in `buffer`.
    ///
    /// A body that fails mid-stream is logged and replaced by an empty one.
    pub async fn capture(response: Response, buffer: &ResponseBuffer) -> Self {
        let (mut parts, body) = response.into_parts();
        let body = match buffer_body(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, status = %parts.status, "Error buffering response body");
                parts.headers.remove(CONTENT_LENGTH);
                Bytes::new()
            }
        };
        buffer.capture(body.clone());
        Self { parts, body }
    }

    pub fn status(&self) -> axum::http::StatusCode {
        self.parts.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Rebuild the response around `body`.
    pub fn into_response(self, body: Body) -> Response {
        Response::from_parts(self.parts, body)
    }
}

impl LoggedResult for CapturedResponse {
    fn shape(&self) -> ResponseShape {
        if self.body.is_empty() {
            return ResponseShape::Null;
        }

        match serde_json::from_slice::<serde_json::Value>(&self.body) {
            Ok(value) => value.shape(),
            Err(_) => ResponseShape::Value(String::from_utf8_lossy(&self.body).into_owned()),
        }
    }
}
