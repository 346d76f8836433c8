//! Configuration loading and config file resolution
//!
//! Configuration is read once per session from a TOML file. Every section and
//! field is optional; anything missing falls back to built-in defaults.
//!
//! # Config File Resolution
//!
//! 1. Explicit path passed by the caller (highest priority)
//! 2. Environment variable `MRVA_CONFIG`
//! 3. `<config_dir>/mrva/config.toml` (e.g. `~/.config/mrva/config.toml` on Linux)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MRVA_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outbound event channel configuration (optional)
    #[serde(default)]
    pub events: EventsConfig,

    /// Run status polling configuration (optional)
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Presentation limits (optional)
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Outbound event channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Number of outbound messages buffered before slow subscribers lag
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

/// Run status polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Delay between two status polls of the job source
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls attempted before the monitor gives up on a run
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

/// Presentation limits applied when building snapshots
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// Maximum repositories listed per skip group; counts are never truncated
    #[serde(default)]
    pub skipped_repositories_limit: Option<usize>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    256
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_poll_attempts() -> u32 {
    // One day of polling at the default interval
    17_280
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be greater than 0".to_string()));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(Error::Config(
                "monitor.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves and loads the session configuration
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Locate the config file following the resolution priority order
    ///
    /// Returns `None` when no candidate exists, meaning compiled defaults apply.
    pub fn locate(&self) -> Option<PathBuf> {
        // Priority 1: explicit path
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: user config directory
        dirs::config_dir()
            .map(|d| d.join("mrva").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Load configuration, falling back to defaults when no file is found
    ///
    /// A missing file is not an error; a file that exists but fails to parse is.
    pub fn load(&self) -> Result<TomlConfig> {
        let Some(path) = self.locate() else {
            info!("No config file found, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!("Config file {} does not exist, using compiled defaults", path.display());
            return Ok(TomlConfig::default());
        }

        info!("Loading config from {}", path.display());
        TomlConfig::load_from(&path)
    }
}
