//! Error types.

/// Invalid or unreadable logging configuration.
///
/// Raised while building a [`LoggingPolicy`](crate::LoggingPolicy); a process
/// must not start instrumenting with a configuration that produced one.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid logging level: {value:?}. Allowed values: info, debug, warn, error")]
    InvalidLevel { value: String },

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

/// Error while buffering a request or response body.
#[derive(Debug, thiserror::Error)]
pub enum BodyReadError {
    #[error("Body stream error: {0}")]
    StreamError(String),
}
