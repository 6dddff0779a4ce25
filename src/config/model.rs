//! Configuration model for procwatch

use serde::{Deserialize, Serialize};

use crate::executor::ZeroTimeout;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Default settings applied to every invocation
    #[serde(default)]
    pub defaults: Defaults,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default settings applied to every invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Default timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// What a timeout of zero means
    #[serde(default)]
    pub zero_timeout: ZeroTimeout,

    /// How long to wait for output streams to close after the process is gone
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_drain_grace_ms() -> u64 {
    1_000
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            zero_timeout: ZeroTimeout::default(),
            drain_grace_ms: default_drain_grace_ms(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter, e.g. "info" or "procwatch=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
