//! Configuration structures for the evmc-bridge.
//!
//! This module defines configuration options for the bridge:
//! - [`BridgeConfig`]: Top-level configuration containing all settings
//! - [`SchedulerConfig`]: Worker threads that run engine executions
//! - [`LoggingConfig`]: Tracing subscriber settings
//!
//! # Example
//!
//! ```toml
//! [scheduler]
//! thread_name = "evm-worker"
//! stack_size_kb = 32768
//!
//! [logging]
//! filter = "debug"
//! json = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Worker thread settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }
}

/// Worker thread configuration.
///
/// Each execution runs on its own worker thread. Engines recurse through
/// the host on nested calls, so the stack size matters for deep call chains.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Prefix for worker thread names; a sequence number is appended.
    #[serde(default = "defaults::thread_name")]
    pub thread_name: String,

    /// Stack size of each worker thread in kilobytes.
    #[serde(default = "defaults::stack_size_kb")]
    pub stack_size_kb: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: defaults::thread_name(),
            stack_size_kb: defaults::stack_size_kb(),
        }
    }
}

impl SchedulerConfig {
    /// Get the worker stack size in bytes.
    pub fn stack_size_bytes(&self) -> usize {
        self.stack_size_kb.saturating_mul(1024)
    }
}

/// Tracing subscriber configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "defaults::log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::log_filter(),
            json: false,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn thread_name() -> String {
        "evmc-worker".to_string()
    }

    pub const fn stack_size_kb() -> usize {
        16 * 1024
    }

    pub fn log_filter() -> String {
        "info,evmc_bridge=debug".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert_eq!(config.scheduler.thread_name, "evmc-worker");
        assert_eq!(config.scheduler.stack_size_kb, 16 * 1024);
        assert_eq!(config.logging.filter, "info,evmc_bridge=debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_stack_size_bytes() {
        let config = SchedulerConfig {
            stack_size_kb: 2,
            ..Default::default()
        };
        assert_eq!(config.stack_size_bytes(), 2048);
    }

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BridgeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.scheduler.thread_name,
            deserialized.scheduler.thread_name
        );
        assert_eq!(config.logging.filter, deserialized.logging.filter);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [scheduler]
            stack_size_kb = 4096
        "#;

        let config = BridgeConfig::from_toml(toml).unwrap();

        assert_eq!(config.scheduler.stack_size_kb, 4096);
        // Defaults applied
        assert_eq!(config.scheduler.thread_name, "evmc-worker");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [scheduler]
            thread_name = "evm-worker"
            stack_size_kb = 32768

            [logging]
            filter = "debug"
            json = true
        "#;

        let config = BridgeConfig::from_toml(toml).unwrap();

        assert_eq!(config.scheduler.thread_name, "evm-worker");
        assert_eq!(config.scheduler.stack_size_kb, 32768);
        assert_eq!(config.logging.filter, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = BridgeConfig::from_toml("this is not valid toml [");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = BridgeConfig::from_file("/nonexistent/evmc-bridge.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
