//! Ordered log severities.
//!
//! Severities tag every emitted record and are also the unit of filtering: a
//! [`LoggingPolicy`](crate::LoggingPolicy) carries a minimum severity and only
//! records at or above it reach the log stream.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Severity of a log record, ordered `Debug < Info < Warn < Error`.
///
/// # Examples
///
/// ```rust
/// use loggable::Severity;
///
/// let level: Severity = " Warn ".parse().unwrap();
/// assert_eq!(level, Severity::Warn);
/// assert!(Severity::Error > level);
/// assert!("verbose".parse::<Severity>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];

    /// Parse a configured level name, ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let trimmed = text.trim();
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigurationError::InvalidLevel {
                value: text.to_owned(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl FromStr for Severity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Severity> for tracing::Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Info => tracing::Level::INFO,
            Severity::Warn => tracing::Level::WARN,
            Severity::Error => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        for (text, expected) in [
            ("debug", Severity::Debug),
            ("INFO", Severity::Info),
            ("Warn", Severity::Warn),
            ("eRrOr", Severity::Error),
        ] {
            assert_eq!(Severity::parse(text).unwrap(), expected, "parsing {text:?}");
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Severity::parse("  info\n").unwrap(), Severity::Info);
        assert_eq!("\twarn ".parse::<Severity>().unwrap(), Severity::Warn);
    }

    #[test]
    fn test_parse_rejects_unknown_levels() {
        for text in ["trace", "warning", "fatal", "", "   "] {
            let err = Severity::parse(text).unwrap_err();
            let message = err.to_string();
            assert!(
                message.contains("info, debug, warn, error"),
                "error for {text:?} should list allowed levels: {message}"
            );
        }
    }

    #[test]
    fn test_rank_order() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);

        let mut shuffled = vec![Severity::Warn, Severity::Debug, Severity::Error, Severity::Info];
        shuffled.sort();
        assert_eq!(shuffled, Severity::ALL.to_vec());
    }

    #[test]
    fn test_display_and_tracing_level() {
        assert_eq!(Severity::Warn.to_string(), "WARN");
        assert_eq!(tracing::Level::from(Severity::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(Severity::Error), tracing::Level::ERROR);
    }
}
