//! Configuration for the instrumentation layer.
//!
//! Loads settings from an optional `config/loggable` file and `LOGGABLE_*`
//! environment variables.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::policy::LoggingPolicy;

/// Raw instrumentation settings, before validation.
///
/// # Examples
///
/// ```rust
/// use loggable::LoggableConfig;
///
/// let config = LoggableConfig::from_toml("enabled = true\nlevel = \"debug\"").unwrap();
/// let policy = config.policy().unwrap();
/// assert!(policy.is_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggableConfig {
    /// Master switch; nothing is logged or inspected when false
    pub enabled: bool,
    /// Minimum severity name: info, debug, warn or error
    pub level: String,
    /// Maximum number of list elements logged for one response
    pub list_item_limit: Option<usize>,
}

impl Default for LoggableConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
            list_item_limit: None,
        }
    }
}

impl LoggableConfig {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LOGGABLE_*)
    /// 2. config/loggable.* (if exists)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigurationError> {
        let config = Config::builder()
            .add_source(File::with_name("config/loggable").required(false))
            // Flat keys: LOGGABLE_LIST_ITEM_LIMIT maps to list_item_limit
            .add_source(
                Environment::with_prefix("LOGGABLE")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigurationError> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate the level and build the policy it describes.
    pub fn policy(&self) -> Result<LoggingPolicy, ConfigurationError> {
        LoggingPolicy::try_from(self)
    }
}

impl TryFrom<&LoggableConfig> for LoggingPolicy {
    type Error = ConfigurationError;

    fn try_from(config: &LoggableConfig) -> Result<Self, Self::Error> {
        LoggingPolicy::new(config.enabled, &config.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    #[test]
    fn test_default_config_is_disabled() {
        let config = LoggableConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.level, "info");
        assert_eq!(config.list_item_limit, None);

        let policy = config.policy().unwrap();
        assert!(!policy.is_enabled());
    }

    #[test]
    fn test_from_toml_fills_missing_fields() {
        let config = LoggableConfig::from_toml("enabled = true").unwrap();
        assert!(config.enabled);
        assert_eq!(config.level, "info");

        let config =
            LoggableConfig::from_toml("enabled = true\nlevel = \"WARN\"\nlist_item_limit = 10")
                .unwrap();
        assert_eq!(config.list_item_limit, Some(10));
        assert_eq!(config.policy().unwrap().minimum_severity(), Severity::Warn);
    }

    #[test]
    fn test_invalid_level_surfaces_when_building_policy() {
        let config = LoggableConfig::from_toml("enabled = true\nlevel = \"verbose\"").unwrap();
        let err = config.policy().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    // The only test touching LOGGABLE_* variables, so it cannot race another
    #[test]
    fn test_load_reads_environment() {
        std::env::set_var("LOGGABLE_ENABLED", "true");
        std::env::set_var("LOGGABLE_LEVEL", "debug");
        std::env::set_var("LOGGABLE_LIST_ITEM_LIMIT", "25");

        let loaded = LoggableConfig::load();

        std::env::remove_var("LOGGABLE_ENABLED");
        std::env::remove_var("LOGGABLE_LEVEL");
        std::env::remove_var("LOGGABLE_LIST_ITEM_LIMIT");

        let config = loaded.unwrap();
        assert!(config.enabled);
        assert_eq!(config.level, "debug");
        assert_eq!(config.list_item_limit, Some(25));
        assert_eq!(config.policy().unwrap().minimum_severity(), Severity::Debug);
    }

    #[test]
    fn test_malformed_document_is_a_source_error() {
        let err = LoggableConfig::from_toml("enabled = [").unwrap_err();
        assert!(matches!(err, ConfigurationError::Source(_)));
    }
}
