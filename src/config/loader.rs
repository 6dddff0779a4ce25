//! Configuration loader with XDG-compliant path resolution
//!
//! Loads configuration from multiple locations with layered priority:
//! 1. `/etc/procwatch/config.toml` (lowest priority)
//! 2. `~/.config/procwatch/config.toml`
//! 3. `~/.procwatch.toml`
//! 4. `./.procwatch.toml` (highest priority)

use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "procwatch";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "PROCWATCH_";

/// Get XDG config search paths in priority order (lowest to highest)
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide config (lowest priority)
    paths.push(PathBuf::from(format!("/etc/{}/config.toml", APP_NAME)));

    // 2. XDG config home
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }

    // 3. Home directory
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}.toml", APP_NAME)));
    }

    // 4. Current directory (highest priority)
    paths.push(PathBuf::from(format!(".{}.toml", APP_NAME)));

    paths
}

/// Build the layered figment without extracting it
fn figment(override_path: Option<&str>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }
    }

    if let Some(path) = override_path {
        let path = PathBuf::from(path);
        if path.exists() {
            tracing::debug!("Loading override config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        } else {
            tracing::warn!("Override config not found: {}", path.display());
        }
    }

    // Format: PROCWATCH_DEFAULTS__TIMEOUT_MS=600
    // Maps to: defaults.timeout_ms = 600
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration with XDG layering
///
/// Files are merged in priority order, later files overriding earlier ones.
/// Environment variables prefixed with `PROCWATCH_` override all files.
/// `PROCWATCH_LOG` is not part of the config; it is read by the logger.
///
/// # Arguments
/// * `override_path` - Optional path to a config file that takes highest file priority
pub fn load_config(override_path: Option<&str>) -> Result<Config> {
    figment(override_path)
        .extract()
        .context("Failed to load configuration")
}

/// Find all existing config files (for introspection)
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.exists()).collect()
}

/// Get the default config file path
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME).join("config.toml"))
}
