//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PROCWATCH_LOG` environment variable (e.g. "info", "procwatch=debug")
//! 3. `logging.level` from the configuration
//!
//! Logs go to stderr so captured child output on stdout stays clean.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "PROCWATCH_LOG";

/// Pick the filter directive from the flag, the environment, then config
pub fn resolve_filter(cli_level: Option<&str>, config: &LoggingConfig) -> String {
    cli_level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| config.level.clone())
}

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<&str>, config: &LoggingConfig) -> Result<()> {
    let directive = resolve_filter(cli_level, config);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow!("invalid log filter '{}': {}", directive, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_wins() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        };
        assert_eq!(resolve_filter(Some("trace"), &config), "trace");
    }

    #[test]
    fn test_config_level_fallback() {
        let config = LoggingConfig {
            level: "procwatch=debug".to_string(),
            format: LogFormat::Pretty,
        };
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(resolve_filter(None, &config), "procwatch=debug");
        }
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(init_logging(Some("procwatch=notalevel[["), &config).is_err());
    }
}
