//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from a TOML file located by priority:
//! 1. Command-line argument (highest priority)
//! 2. `GDSR_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/gdsr/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not an error: a warning is logged and the compiled
//! defaults are used. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GDSR_CONFIG";

/// Results browser bootstrap configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Base URL of the results service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Project opened at startup (optional, CLI may override)
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Infinite-scroll trigger settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Distance from the bottom (px) that counts as "reached the end"
    #[serde(default = "default_threshold_px")]
    pub threshold_px: f64,

    /// Trailing debounce window for scroll events
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_threshold_px() -> f64 {
    50.0
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_event_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            project_id: None,
            http: HttpConfig::default(),
            scroll: ScrollConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            threshold_px: default_threshold_px(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl BrowserConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BrowserConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        if self.scroll.threshold_px < 0.0 || !self.scroll.threshold_px.is_finite() {
            return Err(Error::Config(format!(
                "scroll.threshold_px must be a non-negative number, got {}",
                self.scroll.threshold_px
            )));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Locate the config file following the priority order above
///
/// Returns None when no candidate is named and the platform default does
/// not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|path| path.exists())
}

/// `<config_dir>/gdsr/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gdsr").join("config.toml"))
}

/// Load configuration, degrading to compiled defaults when no file exists
pub fn load_config(cli_arg: Option<&Path>) -> Result<BrowserConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using compiled defaults");
        return Ok(BrowserConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} does not exist, using compiled defaults",
            path.display()
        );
        return Ok(BrowserConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = BrowserConfig::from_toml_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.scroll.threshold_px, 50.0);
        assert_eq!(config.scroll.debounce_ms, 200);
        assert_eq!(config.events.capacity, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.project_id.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BrowserConfig::from_toml_str(
            r#"
            api_base_url = "http://results.local/api"
            project_id = "proj-7"

            [scroll]
            debounce_ms = 350
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://results.local/api");
        assert_eq!(config.project_id.as_deref(), Some("proj-7"));
        assert_eq!(config.scroll.debounce_ms, 350);
        assert_eq!(config.scroll.threshold_px, 50.0);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(BrowserConfig::from_toml_str("api_base_url = \"\"").is_err());
        assert!(BrowserConfig::from_toml_str("[events]\ncapacity = 0").is_err());
        assert!(BrowserConfig::from_toml_str("this is not toml").is_err());
    }
}
