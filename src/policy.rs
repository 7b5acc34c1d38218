//! Resolved logging policy and its shared, swappable handle.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::ConfigurationError;
use crate::severity::Severity;

/// Whether instrumentation is active and the lowest severity it emits.
///
/// A policy is validated when it is built and never changes afterwards. To
/// change the level at runtime, build a new policy and swap it into a
/// [`SharedPolicy`].
///
/// # Examples
///
/// ```rust
/// use loggable::{LoggingPolicy, Severity};
///
/// let policy = LoggingPolicy::new(true, "warn").unwrap();
/// assert!(!policy.is_severity_enabled(Severity::Info));
/// assert!(policy.is_severity_enabled(Severity::Error));
///
/// assert!(LoggingPolicy::new(true, "loud").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingPolicy {
    enabled: bool,
    minimum: Severity,
}

impl LoggingPolicy {
    /// Build a policy from the configured switch and level name.
    pub fn new(enabled: bool, level: &str) -> Result<Self, ConfigurationError> {
        let minimum = Severity::parse(level)?;
        Ok(Self::with_minimum(enabled, minimum))
    }

    pub fn with_minimum(enabled: bool, minimum: Severity) -> Self {
        Self { enabled, minimum }
    }

    /// A policy that emits nothing.
    pub fn disabled() -> Self {
        Self::with_minimum(false, Severity::Info)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn minimum_severity(&self) -> Severity {
        self.minimum
    }

    /// True iff the policy is enabled and `severity` is at or above the minimum.
    pub fn is_severity_enabled(&self, severity: Severity) -> bool {
        self.enabled && severity >= self.minimum
    }
}

impl Default for LoggingPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// A policy shared between every component of one process.
///
/// Readers take a snapshot with [`load`](Self::load); [`replace`](Self::replace)
/// installs a new policy atomically. Clones share the same slot.
#[derive(Debug, Clone)]
pub struct SharedPolicy {
    current: Arc<ArcSwap<LoggingPolicy>>,
}

impl SharedPolicy {
    pub fn new(policy: LoggingPolicy) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(policy)),
        }
    }

    pub fn load(&self) -> Arc<LoggingPolicy> {
        self.current.load_full()
    }

    pub fn replace(&self, policy: LoggingPolicy) {
        self.current.store(Arc::new(policy));
    }

    pub fn is_enabled(&self) -> bool {
        self.current.load().is_enabled()
    }

    pub fn is_severity_enabled(&self, severity: Severity) -> bool {
        self.current.load().is_severity_enabled(severity)
    }
}

impl From<LoggingPolicy> for SharedPolicy {
    fn from(policy: LoggingPolicy) -> Self {
        Self::new(policy)
    }
}

impl Default for SharedPolicy {
    fn default() -> Self {
        Self::new(LoggingPolicy::disabled())
    }
}
