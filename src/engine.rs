//! Call-shapes for intercepted operations.
//!
//! An [`Interceptor`] logs around a call that someone else has decided to
//! intercept. Callers wrap operations explicitly, either by routing the call
//! through one of the call-shape methods or by stacking an [`InterceptLayer`]
//! on a tower service.
//!
//! ```text
//! invoke:  on_entry ─► proceed() ─┬─► on_success
//!                                 └─► on_failure ─► Err(original error)
//!
//! timed:   start clock ─► proceed() ─┬─► INFO  "... executed in N ms"
//!                                    └─► ERROR "Method failure ..." ─► Err(original error)
//! ```

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::emit;
use crate::severity::Severity;
use crate::sink::{Debugged, LogSink};
use crate::types::Invocation;

/// The interception engine.
///
/// Failures of the wrapped call are always logged at ERROR and handed back
/// unchanged; nothing here swallows or rewraps an error.
///
/// # Examples
///
/// ```rust
/// use loggable::{Interceptor, Invocation, LogSink, LoggingPolicy};
///
/// let interceptor = Interceptor::new(LogSink::tracing(LoggingPolicy::new(true, "info").unwrap()));
///
/// let total: Result<u32, std::num::ParseIntError> =
///     interceptor.timed(&Invocation::named("Parser::parse"), || "42".parse());
/// assert_eq!(total, Ok(42));
/// ```
#[derive(Debug, Clone)]
pub struct Interceptor {
    sink: LogSink,
}

impl Interceptor {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Log the operation name and arguments before the call.
    pub fn on_entry(&self, invocation: &Invocation<'_>) {
        emit!(
            self.sink,
            Severity::Info,
            "Before: {}() with args = {}",
            invocation.operation(),
            invocation.arguments()
        );
    }

    /// Log the result of a call that returned normally.
    pub fn on_success<R: Debug + ?Sized>(&self, invocation: &Invocation<'_>, result: &R) {
        self.log_success(invocation.operation(), result);
    }

    /// Log a failed call and hand the error back for the caller to return.
    ///
    /// ```rust
    /// # use loggable::{Interceptor, Invocation, LogSink, LoggingPolicy};
    /// # let interceptor = Interceptor::new(LogSink::tracing(LoggingPolicy::disabled()));
    /// fn load(interceptor: &Interceptor) -> Result<String, std::io::Error> {
    ///     let invocation = Invocation::named("Store::load");
    ///     std::fs::read_to_string("/nonexistent")
    ///         .map_err(|error| interceptor.on_failure(&invocation, error))
    /// }
    /// assert!(load(&interceptor).is_err());
    /// ```
    pub fn on_failure<E: Display>(&self, invocation: &Invocation<'_>, error: E) -> E {
        self.log_failure(invocation.operation(), &error);
        error
    }

    /// Entry, call, then success or failure.
    pub fn invoke<T, E, F>(&self, invocation: &Invocation<'_>, proceed: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: Debug,
        E: Display,
    {
        self.on_entry(invocation);
        let outcome = proceed();
        self.complete(invocation.operation(), outcome)
    }

    /// Measure the wall-clock time spent in `proceed` and log it.
    ///
    /// When the policy is disabled `proceed` is called directly.
    pub fn timed<T, E, F>(&self, invocation: &Invocation<'_>, proceed: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
    {
        if !self.sink.policy().is_enabled() {
            return proceed();
        }

        let start = Instant::now();
        let outcome = proceed();
        let elapsed = start.elapsed();

        self.record_timing(invocation.operation(), elapsed, outcome)
    }

    /// [`invoke`](Self::invoke) around a future.
    ///
    /// Nothing is written until the returned future is first polled; the
    /// entry record comes first, then success or failure once the wrapped
    /// future resolves.
    pub fn invoke_async<'a, F, T, E>(
        &'a self,
        invocation: &Invocation<'a>,
        future: F,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        F: Future<Output = Result<T, E>> + 'a,
        T: Debug + 'a,
        E: Display + 'a,
    {
        let entry = self.render_entry(invocation);
        self.settle(invocation.operation(), entry, future)
    }

    /// [`timed`](Self::timed) around a future.
    pub fn timed_async<'a, F, T, E>(
        &'a self,
        invocation: &Invocation<'a>,
        future: F,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        F: Future<Output = Result<T, E>> + 'a,
        T: 'a,
        E: Display + 'a,
    {
        self.time(invocation.operation(), future)
    }

    /// Arguments rendered up front, so the returned future does not borrow
    /// them; `None` when the entry record would be filtered.
    fn render_entry(&self, invocation: &Invocation<'_>) -> Option<String> {
        self.sink
            .is_enabled(Severity::Info)
            .then(|| invocation.arguments().to_string())
    }

    async fn settle<F, T, E>(
        &self,
        operation: &str,
        entry: Option<String>,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: Debug,
        E: Display,
    {
        if let Some(arguments) = entry {
            emit!(
                self.sink,
                Severity::Info,
                "Before: {}() with args = {}",
                operation,
                arguments
            );
        }

        let outcome = future.await;
        self.complete(operation, outcome)
    }

    async fn time<F, T, E>(&self, operation: &str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let enabled = self.sink.policy().is_enabled();
        if !enabled {
            return future.await;
        }

        let start = Instant::now();
        let outcome = future.await;
        let elapsed = start.elapsed();

        self.record_timing(operation, elapsed, outcome)
    }

    fn complete<T: Debug, E: Display>(&self, operation: &str, outcome: Result<T, E>) -> Result<T, E> {
        match &outcome {
            Ok(result) => self.log_success(operation, result),
            Err(error) => self.log_failure(operation, error),
        }
        outcome
    }

    fn record_timing<T, E: Display>(
        &self,
        operation: &str,
        elapsed: Duration,
        outcome: Result<T, E>,
    ) -> Result<T, E> {
        match &outcome {
            Ok(_) => emit!(
                self.sink,
                Severity::Info,
                "Around: {}() executed in {} ms",
                operation,
                elapsed.as_millis()
            ),
            Err(error) => emit!(
                self.sink,
                Severity::Error,
                "Method failure in {}() after {} ms: {}",
                operation,
                elapsed.as_millis(),
                error
            ),
        }
        outcome
    }

    fn log_success<R: Debug + ?Sized>(&self, operation: &str, result: &R) {
        emit!(
            self.sink,
            Severity::Info,
            "AfterReturning: from {}() with result = {}",
            operation,
            Debugged(result)
        );
    }

    fn log_failure<E: Display + ?Sized>(&self, operation: &str, error: &E) {
        emit!(
            self.sink,
            Severity::Error,
            "AfterThrowing in {}() with exception = {}",
            operation,
            error
        );
    }
}

/// Which call-shape an [`InterceptLayer`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// Entry record, then success or failure record
    Logged,
    /// Elapsed time record, or failure record
    Timed,
}

/// Tower layer applying one call-shape to every call of the wrapped service.
///
/// # Examples
///
/// ```rust
/// use loggable::{CallShape, InterceptLayer, Interceptor, LogSink, LoggingPolicy};
/// use tower::{service_fn, Layer};
///
/// let interceptor = Interceptor::new(LogSink::tracing(LoggingPolicy::new(true, "info").unwrap()));
/// let layer = InterceptLayer::new(interceptor, "Quotes::price", CallShape::Timed);
///
/// let service = layer.layer(service_fn(|symbol: String| async move {
///     Ok::<_, std::convert::Infallible>(symbol.len() as u64 * 100)
/// }));
/// ```
#[derive(Debug, Clone)]
pub struct InterceptLayer {
    interceptor: Interceptor,
    operation: Arc<str>,
    shape: CallShape,
}

impl InterceptLayer {
    pub fn new(interceptor: Interceptor, operation: impl Into<Arc<str>>, shape: CallShape) -> Self {
        Self {
            interceptor,
            operation: operation.into(),
            shape,
        }
    }
}

impl<S> Layer<S> for InterceptLayer {
    type Service = InterceptService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptService {
            inner,
            interceptor: self.interceptor.clone(),
            operation: self.operation.clone(),
            shape: self.shape,
        }
    }
}

/// Service produced by [`InterceptLayer`].
#[derive(Debug, Clone)]
pub struct InterceptService<S> {
    inner: S,
    interceptor: Interceptor,
    operation: Arc<str>,
    shape: CallShape,
}

impl<S, Req> Service<Req> for InterceptService<S>
where
    S: Service<Req>,
    S::Future: Send + 'static,
    S::Response: Debug + Send + 'static,
    S::Error: Display + Send + 'static,
    Req: Debug,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let entry = match self.shape {
            CallShape::Logged => {
                let args: [&dyn Debug; 1] = [&request];
                self.interceptor
                    .render_entry(&Invocation::new(&self.operation, &args))
            }
            CallShape::Timed => None,
        };

        let future = self.inner.call(request);
        let interceptor = self.interceptor.clone();
        let operation = self.operation.clone();
        let shape = self.shape;

        Box::pin(async move {
            match shape {
                CallShape::Logged => interceptor.settle(&operation, entry, future).await,
                CallShape::Timed => interceptor.time(&operation, future).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LoggingPolicy;
    use crate::stream::RecordingStream;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::error::Error;
    use tower::{service_fn, ServiceExt};

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom #{}", self.0)
        }
    }

    impl Error for Boom {}

    fn interceptor(enabled: bool, level: &str) -> (Interceptor, Arc<RecordingStream>) {
        let stream = Arc::new(RecordingStream::new());
        let sink = LogSink::new(LoggingPolicy::new(enabled, level).unwrap(), stream.clone());
        (Interceptor::new(sink), stream)
    }

    fn logged_millis(message: &str) -> u128 {
        message
            .trim_end_matches(" ms")
            .rsplit(' ')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or_else(|| panic!("no duration in {message:?}"))
    }

    #[test]
    fn test_entry_record_lists_arguments() {
        let (interceptor, stream) = interceptor(true, "info");
        let id = 7;
        let args: [&dyn Debug; 2] = [&id, &"draft"];
        interceptor.on_entry(&Invocation::new("TaskService::rename", &args));

        let records = stream.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Info);
        assert_eq!(
            records[0].message,
            r#"Before: TaskService::rename() with args = [7, "draft"]"#
        );
    }

    #[test]
    fn test_warn_policy_filters_entry_but_not_failure() {
        let (interceptor, stream) = interceptor(true, "warn");
        let invocation = Invocation::named("TaskService::delete");

        interceptor.on_entry(&invocation);
        assert!(stream.is_empty());

        let error = interceptor.on_failure(&invocation, Boom(1));
        assert_eq!(error, Boom(1));
        let records = stream.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(
            records[0].message,
            "AfterThrowing in TaskService::delete() with exception = boom #1"
        );
    }

    #[test]
    fn test_invoke_success_logs_entry_then_result() {
        let (interceptor, stream) = interceptor(true, "info");
        let calls = Cell::new(0);

        let result: Result<Vec<u32>, Boom> =
            interceptor.invoke(&Invocation::named("TaskService::ids"), || {
                calls.set(calls.get() + 1);
                Ok(vec![1, 2])
            });

        assert_eq!(result, Ok(vec![1, 2]));
        assert_eq!(calls.get(), 1);
        assert_eq!(
            stream.messages(),
            vec![
                "Before: TaskService::ids() with args = []",
                "AfterReturning: from TaskService::ids() with result = [1, 2]",
            ]
        );
    }

    #[test]
    fn test_invoke_failure_returns_the_same_error() {
        let (interceptor, stream) = interceptor(true, "info");

        let original: Box<dyn Error> = Box::new(Boom(9));
        let address = &*original as *const dyn Error as *const () as usize;

        let result: Result<(), Box<dyn Error>> =
            interceptor.invoke(&Invocation::named("TaskService::save"), || Err(original));

        let returned = result.unwrap_err();
        assert_eq!(&*returned as *const dyn Error as *const () as usize, address);
        assert_eq!(stream.at(Severity::Error).len(), 1);
        assert!(stream.at(Severity::Info)[0].message.starts_with("Before:"));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_disabled_policy_is_transparent() {
        let (interceptor, stream) = interceptor(false, "debug");
        let invocation = Invocation::named("TaskService::get");

        interceptor.on_entry(&invocation);
        interceptor.on_success(&invocation, &5);
        assert_eq!(interceptor.on_failure(&invocation, Boom(2)), Boom(2));
        assert_eq!(interceptor.invoke(&invocation, || Ok::<_, Boom>(3)), Ok(3));
        assert_eq!(interceptor.invoke(&invocation, || Err::<u8, _>(Boom(4))), Err(Boom(4)));
        assert_eq!(interceptor.timed(&invocation, || Ok::<_, Boom>("v")), Ok("v"));
        assert_eq!(interceptor.timed(&invocation, || Err::<(), _>(Boom(5))), Err(Boom(5)));

        assert!(stream.is_empty());
    }

    #[test]
    fn test_timed_logs_elapsed_millis() {
        let (interceptor, stream) = interceptor(true, "info");

        let result = interceptor.timed(&Invocation::named("TaskService::slow"), || {
            std::thread::sleep(Duration::from_millis(25));
            Ok::<_, Boom>("done")
        });

        assert_eq!(result, Ok("done"));
        let records = stream.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Info);
        assert!(records[0]
            .message
            .starts_with("Around: TaskService::slow() executed in "));
        assert!(logged_millis(&records[0].message) >= 25);
    }

    #[test]
    fn test_timed_failure_logs_error_and_returns_it() {
        let (interceptor, stream) = interceptor(true, "info");

        let result: Result<(), Boom> =
            interceptor.timed(&Invocation::named("TaskService::flaky"), || Err(Boom(3)));

        assert_eq!(result, Err(Boom(3)));
        let records = stream.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Error);
        assert!(records[0].message.starts_with("Method failure in TaskService::flaky()"));
        assert!(records[0].message.ends_with("boom #3"));
    }

    #[tokio::test]
    async fn test_async_shapes() {
        let (interceptor, stream) = interceptor(true, "info");

        let value = interceptor
            .invoke_async(&Invocation::named("Remote::fetch"), async {
                Ok::<_, Boom>(String::from("payload"))
            })
            .await;
        assert_eq!(value, Ok("payload".to_string()));

        let timed = interceptor
            .timed_async(&Invocation::named("Remote::wait"), async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<(), _>(Boom(8))
            })
            .await;
        assert_eq!(timed, Err(Boom(8)));

        let records = stream.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "Before: Remote::fetch() with args = []");
        assert_eq!(
            records[1].message,
            r#"AfterReturning: from Remote::fetch() with result = "payload""#
        );
        assert_eq!(records[2].severity, Severity::Error);
        assert!(records[2].message.contains("Remote::wait()"));
    }

    #[tokio::test]
    async fn test_invoke_async_logs_nothing_until_polled() {
        let (interceptor, stream) = interceptor(true, "info");
        let attempt = String::from("first");
        let args: [&dyn Debug; 1] = [&attempt];

        let abandoned = interceptor.invoke_async(&Invocation::new("Remote::fetch", &args), async {
            Ok::<_, Boom>(1)
        });
        drop(abandoned);
        assert!(stream.is_empty());

        let pending = interceptor.invoke_async(&Invocation::new("Remote::fetch", &args), async {
            Ok::<_, Boom>(2)
        });
        assert!(stream.is_empty());

        assert_eq!(pending.await, Ok(2));
        assert_eq!(
            stream.messages(),
            vec![
                r#"Before: Remote::fetch() with args = ["first"]"#,
                "AfterReturning: from Remote::fetch() with result = 2",
            ]
        );
    }

    #[tokio::test]
    async fn test_intercept_layer_logged_shape() {
        let (interceptor, stream) = interceptor(true, "info");
        let service = InterceptLayer::new(interceptor, "Doubler::call", CallShape::Logged)
            .layer(service_fn(|x: u32| async move { Ok::<_, Infallible>(x * 2) }));

        let response = service.oneshot(21).await.unwrap();

        assert_eq!(response, 42);
        assert_eq!(
            stream.messages(),
            vec![
                "Before: Doubler::call() with args = [21]",
                "AfterReturning: from Doubler::call() with result = 42",
            ]
        );
    }

    #[tokio::test]
    async fn test_intercept_layer_timed_failure() {
        let (interceptor, stream) = interceptor(true, "info");
        let service = InterceptLayer::new(interceptor, "Broken::call", CallShape::Timed)
            .layer(service_fn(|_: ()| async { Err::<(), _>(Boom(11)) }));

        let err = service.oneshot(()).await.unwrap_err();

        assert_eq!(err, Boom(11));
        let records = stream.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Error);
    }
}
