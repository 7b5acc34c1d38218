//! # Loggable
//!
//! Leveled logging around selected operations of a service, without logging
//! statements inside the operations themselves.
//!
//! ## Features
//!
//! - **Call-shapes**: entry, success, failure and timed logging around any
//!   call or future, through [`Interceptor`]
//! - **HTTP exchanges**: request line, headers, request body and response
//!   logging for axum, through [`HttpLogLayer`]
//! - **Policy filtering**: one immutable [`LoggingPolicy`] decides whether
//!   anything is logged and from which [`Severity`] up
//! - **Transparent failures**: errors from wrapped calls are logged and handed
//!   back unchanged
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Json, Router};
//! use loggable::{HttpInstrumentation, HttpLogLayer, LogSink, LoggableConfig};
//!
//! async fn tasks() -> Json<Vec<&'static str>> {
//!     Json(vec!["write docs", "ship"])
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     loggable::logging::init();
//!
//!     let config = LoggableConfig::load()?;
//!     let sink = LogSink::tracing(config.policy()?);
//!     let instrumentation =
//!         HttpInstrumentation::new(sink).with_list_item_limit(config.list_item_limit);
//!
//!     let app = Router::new()
//!         .route("/tasks", get(tasks))
//!         .layer(HttpLogLayer::new(instrumentation));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Wrapping Calls
//!
//! ```rust
//! use loggable::{Interceptor, Invocation, LogSink, LoggingPolicy};
//!
//! #[derive(Debug)]
//! struct Task {
//!     title: String,
//! }
//!
//! fn create(title: &str) -> Result<Task, std::io::Error> {
//!     Ok(Task { title: title.to_string() })
//! }
//!
//! let interceptor = Interceptor::new(LogSink::tracing(LoggingPolicy::new(true, "info").unwrap()));
//!
//! let title = "write docs";
//! let args: [&dyn std::fmt::Debug; 1] = [&title];
//! let task = interceptor
//!     .invoke(&Invocation::new("TaskService::create", &args), || create(title))
//!     .unwrap();
//! assert_eq!(task.title, "write docs");
//! ```

use std::fmt::Display;
use std::task::{Context, Poll};

use axum::{extract::Request, response::Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub mod body_wrapper;
use body_wrapper::{BufferedRequest, CapturedResponse, ResponseBuffer};

pub mod config;
pub use config::LoggableConfig;

pub mod engine;
pub use engine::{CallShape, InterceptLayer, InterceptService, Interceptor};

pub mod error;
pub use error::{BodyReadError, ConfigurationError};

pub mod http;
pub use http::{HttpInstrumentation, RequestView, ResponseView};

pub mod logging;

pub mod policy;
pub use policy::{LoggingPolicy, SharedPolicy};

pub mod severity;
pub use severity::Severity;

pub mod sink;
pub use sink::LogSink;

pub mod stream;
pub use stream::{LogRecord, LogStream, RecordingStream, TracingStream};

pub mod types;
pub use types::{Arguments, Invocation, LoggedResult, ResponseShape};

/// Tower layer logging every HTTP exchange that passes through it.
///
/// The wrapped handler's response body is buffered so it can be logged, then
/// restored onto the response sent to the client.
///
/// # Examples
///
/// ```rust,no_run
/// use loggable::{HttpInstrumentation, HttpLogLayer, LogSink, LoggingPolicy};
/// use axum::{routing::get, Router};
/// use tower::ServiceBuilder;
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let sink = LogSink::tracing(LoggingPolicy::new(true, "info").unwrap());
/// let layer = HttpLogLayer::new(HttpInstrumentation::new(sink));
///
/// let app = Router::new()
///     .route("/hello", get(hello))
///     .layer(ServiceBuilder::new().layer(layer));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpLogLayer {
    instrumentation: HttpInstrumentation,
}

impl HttpLogLayer {
    pub fn new(instrumentation: HttpInstrumentation) -> Self {
        Self { instrumentation }
    }
}

impl<S> Layer<S> for HttpLogLayer {
    type Service = HttpLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpLogService {
            inner,
            instrumentation: self.instrumentation.clone(),
        }
    }
}

/// Tower service implementation for the HTTP logging middleware.
///
/// Users typically don't interact with this type directly - it's created by [`HttpLogLayer`].
#[derive(Debug, Clone)]
pub struct HttpLogService<S> {
    inner: S,
    instrumentation: HttpInstrumentation,
}

impl<S> Service<Request> for HttpLogService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, request: Request) -> Self::Future {
        // Keep the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // One policy snapshot decides both the bypass and every record of the exchange
        let instrumentation = self.instrumentation.snapshot();
        if !instrumentation.is_enabled() {
            return Box::pin(inner.call(request));
        }

        let buffer = ResponseBuffer::new();

        Box::pin(async move {
            let capture = buffer.clone();
            let captured = instrumentation
                .exchange(
                    BufferedRequest::new(request),
                    buffer.clone(),
                    move |view: BufferedRequest| async move {
                        let mut inner = inner;
                        debug!("Awaiting inner service response");
                        let response = inner.call(view.into_inner()).await?;
                        Ok::<_, S::Error>(CapturedResponse::capture(response, &capture).await)
                    },
                )
                .await?;

            Ok(captured.into_response(buffer.into_body()))
        })
    }
}
