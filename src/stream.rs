//! Underlying log streams.
//!
//! A [`LogStream`] receives fully formatted records that already passed the
//! policy filter. [`TracingStream`] forwards them to the `tracing` crate;
//! [`RecordingStream`] keeps them in memory.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::severity::Severity;

/// Destination of emitted records.
///
/// Implementations must be safe for concurrent appends; the sink adds no
/// locking of its own.
pub trait LogStream: Send + Sync + 'static {
    /// Append one formatted record tagged with `severity`.
    fn append(&self, severity: Severity, message: &str);
}

/// Stream that writes every record as a `tracing` event.
///
/// Events use the target `loggable` and the level matching the record's
/// severity, so the installed subscriber decides where they end up.
///
/// # Examples
///
/// ```rust
/// use loggable::{LogSink, LoggingPolicy, TracingStream};
///
/// let sink = LogSink::new(LoggingPolicy::new(true, "info").unwrap(), TracingStream);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStream;

impl LogStream for TracingStream {
    fn append(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => debug!(target: "loggable", "{message}"),
            Severity::Info => info!(target: "loggable", "{message}"),
            Severity::Warn => warn!(target: "loggable", "{message}"),
            Severity::Error => error!(target: "loggable", "{message}"),
        }
    }
}

/// A record captured by [`RecordingStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
}

/// In-memory stream, mostly useful in tests.
///
/// Wrap it in an `Arc` to keep a handle after giving it to a sink.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use loggable::{emit, LogSink, LoggingPolicy, RecordingStream, Severity};
///
/// let stream = Arc::new(RecordingStream::new());
/// let sink = LogSink::new(LoggingPolicy::new(true, "info").unwrap(), stream.clone());
///
/// emit!(sink, Severity::Info, "hello {}", "world");
/// emit!(sink, Severity::Debug, "filtered");
///
/// assert_eq!(stream.messages(), vec!["hello world".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingStream {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far, in order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.message)
            .collect()
    }

    /// Records with exactly `severity`, in order.
    pub fn at(&self, severity: Severity) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.severity == severity)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogStream for RecordingStream {
    fn append(&self, severity: Severity, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                severity,
                message: message.to_owned(),
            });
    }
}

impl<T: LogStream> LogStream for std::sync::Arc<T> {
    fn append(&self, severity: Severity, message: &str) {
        (**self).append(severity, message)
    }
}
