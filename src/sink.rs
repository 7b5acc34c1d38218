//! The leveled emission choke point.
//!
//! Every record produced by this crate goes through [`LogSink::emit`], which
//! consults the current policy before doing any formatting work. Templates
//! use `{}` as a positional placeholder.

use std::fmt::{self, Display, Write};
use std::sync::Arc;

use crate::policy::{LoggingPolicy, SharedPolicy};
use crate::severity::Severity;
use crate::stream::{LogStream, TracingStream};

/// Emit a record through a [`LogSink`], evaluating arguments only when the
/// record will actually be written.
///
/// # Examples
///
/// ```rust
/// use loggable::{emit, LogSink, LoggingPolicy, Severity};
///
/// let sink = LogSink::tracing(LoggingPolicy::new(true, "warn").unwrap());
///
/// // `expensive()` never runs: INFO is below the policy's minimum
/// # fn expensive() -> String { unreachable!() }
/// emit!(sink, Severity::Info, "state = {}", expensive());
/// ```
#[macro_export]
macro_rules! emit {
    ($sink:expr, $severity:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let sink: &$crate::LogSink = &$sink;
        let severity: $crate::Severity = $severity;
        if sink.is_enabled(severity) {
            sink.emit(severity, $template, &[$(&$arg as &dyn ::std::fmt::Display),*]);
        }
    }};
}

/// Policy-aware handle on a [`LogStream`].
///
/// Cloning is cheap; clones share both the policy slot and the stream.
#[derive(Clone)]
pub struct LogSink {
    policy: SharedPolicy,
    stream: Arc<dyn LogStream>,
}

impl LogSink {
    pub fn new(policy: impl Into<SharedPolicy>, stream: impl LogStream) -> Self {
        Self {
            policy: policy.into(),
            stream: Arc::new(stream),
        }
    }

    /// Sink writing to `tracing`.
    pub fn tracing(policy: impl Into<SharedPolicy>) -> Self {
        Self::new(policy, TracingStream)
    }

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<LoggingPolicy> {
        self.policy.load()
    }

    pub fn shared_policy(&self) -> &SharedPolicy {
        &self.policy
    }

    /// A sink fixed to the current policy snapshot.
    ///
    /// Later [`SharedPolicy::replace`] calls do not affect the returned sink;
    /// it still writes to the same stream.
    pub fn snapshot(&self) -> Self {
        Self {
            policy: SharedPolicy::from(*self.policy.load()),
            stream: self.stream.clone(),
        }
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.policy.is_severity_enabled(severity)
    }

    /// Format `template` with `args` and append it, if `severity` passes the policy.
    ///
    /// Never fails: when an argument cannot be formatted, the raw template is
    /// emitted instead.
    pub fn emit(&self, severity: Severity, template: &str, args: &[&dyn Display]) {
        if !self.is_enabled(severity) {
            return;
        }

        match render(template, args) {
            Ok(message) => self.stream.append(severity, &message),
            Err(_) => self.stream.append(severity, template),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("policy", &self.policy.load())
            .finish_non_exhaustive()
    }
}

/// Substitute `args` into the `{}` placeholders of `template`, left to right.
///
/// Placeholders without a matching argument are kept as-is; surplus
/// arguments are ignored.
fn render(template: &str, args: &[&dyn Display]) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(index) = rest.find("{}") {
        out.push_str(&rest[..index]);
        match args.next() {
            Some(arg) => write!(out, "{arg}")?,
            None => out.push_str("{}"),
        }
        rest = &rest[index + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Renders a value through its `Debug` implementation.
pub(crate) struct Debugged<'a, T: ?Sized>(pub(crate) &'a T);

impl<T: fmt::Debug + ?Sized> Display for Debugged<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0, f)
    }
}
