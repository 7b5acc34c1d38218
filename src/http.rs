//! Instrumentation of HTTP request/response exchanges.
//!
//! [`HttpInstrumentation::exchange`] walks one exchange through a fixed
//! sequence of steps:
//!
//! ```text
//! request line ─► headers ─► request body (POST/PUT/PATCH) ─► proceed ─┬─► response ─┐
//!                                                                      └─► ERROR ────┤
//!                                                      restore response body ◄───────┘
//! ```
//!
//! Access to the request and response is abstracted by [`RequestView`] and
//! [`ResponseView`]; the axum implementations live in
//! [`body_wrapper`](crate::body_wrapper).

use std::fmt::Display;
use std::future::Future;

use bytes::Bytes;

use crate::emit;
use crate::error::BodyReadError;
use crate::severity::Severity;
use crate::sink::LogSink;
use crate::types::{LoggedResult, ResponseShape};

/// Methods whose request body is logged.
const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Read access to an inbound request.
pub trait RequestView {
    fn method(&self) -> &str;

    fn uri(&self) -> String;

    /// Every header name with its last value; `None` when the value is absent.
    fn headers(&self) -> Vec<(String, Option<String>)>;

    /// Read the whole body.
    ///
    /// Implementations must leave the body readable for whoever consumes the
    /// request afterwards.
    fn read_body(&mut self) -> impl Future<Output = Result<Bytes, BodyReadError>> + Send;
}

/// Buffered response whose content must be written back once the exchange ends.
pub trait ResponseView {
    /// Flush the buffered body to the real response.
    fn restore(&mut self);
}

/// Restores the response when dropped, whichever way the exchange ends.
struct RestoreGuard<B: ResponseView> {
    response: B,
}

impl<B: ResponseView> Drop for RestoreGuard<B> {
    fn drop(&mut self) {
        self.response.restore();
    }
}

/// HTTP flavour of the interception engine.
///
/// # Examples
///
/// ```rust
/// use loggable::{HttpInstrumentation, LogSink, LoggingPolicy};
///
/// let sink = LogSink::tracing(LoggingPolicy::new(true, "info").unwrap());
/// let instrumentation = HttpInstrumentation::new(sink).with_list_item_limit(Some(50));
/// assert!(instrumentation.is_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct HttpInstrumentation {
    sink: LogSink,
    list_item_limit: Option<usize>,
}

impl HttpInstrumentation {
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            list_item_limit: None,
        }
    }

    /// Log at most `limit` elements of a list result.
    pub fn with_list_item_limit(mut self, limit: Option<usize>) -> Self {
        self.list_item_limit = limit;
        self
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.policy().is_enabled()
    }

    /// Instrumentation fixed to the current policy, for the length of one exchange.
    pub fn snapshot(&self) -> Self {
        Self {
            sink: self.sink.snapshot(),
            list_item_limit: self.list_item_limit,
        }
    }

    /// Run one exchange: log the request, call `proceed`, log the outcome and
    /// restore the response body.
    ///
    /// The policy is read once, when the exchange starts; a replacement
    /// made while it runs applies to the next exchange. The error returned
    /// by `proceed` is handed back unchanged. When the policy is disabled,
    /// `proceed` runs without any inspection and `response` is left
    /// untouched.
    pub async fn exchange<Q, B, P, Fut, T, E>(
        &self,
        request: Q,
        response: B,
        proceed: P,
    ) -> Result<T, E>
    where
        Q: RequestView,
        B: ResponseView,
        P: FnOnce(Q) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: LoggedResult,
        E: Display,
    {
        let this = self.snapshot();
        if !this.is_enabled() {
            return proceed(request).await;
        }

        this.run(request, response, proceed).await
    }

    async fn run<Q, B, P, Fut, T, E>(&self, mut request: Q, response: B, proceed: P) -> Result<T, E>
    where
        Q: RequestView,
        B: ResponseView,
        P: FnOnce(Q) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: LoggedResult,
        E: Display,
    {
        let _restore = RestoreGuard { response };

        self.log_request_line(&request);
        self.log_headers(&request);
        self.log_request_body(&mut request).await;

        match proceed(request).await {
            Ok(result) => {
                self.log_response(&result);
                Ok(result)
            }
            Err(error) => {
                emit!(self.sink, Severity::Error, "Exception occurred: {}", error);
                Err(error)
            }
        }
    }

    fn log_request_line<Q: RequestView>(&self, request: &Q) {
        emit!(
            self.sink,
            Severity::Info,
            "HTTP REQUEST: {} {}",
            request.method(),
            request.uri()
        );
    }

    fn log_headers<Q: RequestView>(&self, request: &Q) {
        // WARN is the most severe header record
        if !self.sink.is_enabled(Severity::Warn) {
            return;
        }

        for (name, value) in request.headers() {
            match value {
                Some(value) if !value.trim().is_empty() => {
                    emit!(self.sink, Severity::Info, "Header: {}={}", name, value);
                    emit!(self.sink, Severity::Debug, "Header-DEBUG: {}={}", name, value);
                }
                _ => emit!(
                    self.sink,
                    Severity::Warn,
                    "Header '{}' is present but has no value",
                    name
                ),
            }
        }
    }

    async fn log_request_body<Q: RequestView>(&self, request: &mut Q) {
        if !has_logged_body(request.method()) || !self.sink.is_enabled(Severity::Info) {
            return;
        }

        match request.read_body().await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).replace(&['\r', '\n'][..], "");
                let body = text.trim();
                if !body.is_empty() {
                    emit!(self.sink, Severity::Info, "BODY: {}", body);
                }
            }
            Err(error) => emit!(
                self.sink,
                Severity::Warn,
                "Request body unavailable: {}",
                error
            ),
        }
    }

    fn log_response<T: LoggedResult>(&self, result: &T) {
        if !self.sink.is_enabled(Severity::Info) {
            return;
        }

        match result.shape() {
            ResponseShape::Null => emit!(self.sink, Severity::Info, "RESPONSE: [null]"),
            ResponseShape::List(items) => {
                emit!(
                    self.sink,
                    Severity::Info,
                    "RESPONSE LIST [{} items]:",
                    items.len()
                );

                let shown = self
                    .list_item_limit
                    .map_or(items.len(), |limit| limit.min(items.len()));
                for item in &items[..shown] {
                    emit!(self.sink, Severity::Info, "  - {}", item);
                }
                if shown < items.len() {
                    emit!(
                        self.sink,
                        Severity::Info,
                        "  ... {} more items",
                        items.len() - shown
                    );
                }
            }
            ResponseShape::Value(text) => {
                emit!(self.sink, Severity::Info, "RESPONSE: {}", text)
            }
        }
    }
}

fn has_logged_body(method: &str) -> bool {
    BODY_METHODS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(method))
}
