//! Configuration types for the alfred task service.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskError};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ALFRED_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlfredConfig {
    /// Database location and lock tuning.
    pub store: StoreConfig,
    /// Periodic driver settings.
    pub scheduler: SchedulerConfig,
    /// Notification patrol settings.
    pub patrol: PatrolConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// SQLite store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Longest wait for the in-process write lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// SQLite busy handler timeout, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout_ms: 5_000,
            busy_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between scheduling ticks.
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    /// Whether the notification patrol runs alongside the scheduler.
    pub enabled: bool,
    /// Seconds between patrol passes.
    pub interval_secs: u64,
    /// Local hour (0-23) from which the daily summary is offered.
    pub summary_hour: u32,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            summary_hour: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Optional plain-text log file, written in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("alfred")
        .join("alfred.db")
}

impl AlfredConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TaskError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| TaskError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TaskError::Config(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TaskError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| TaskError::Config(e.to_string()))?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/alfred/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("alfred").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("alfred")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/alfred-config/config.toml")
        }
    }

    /// Load the effective configuration.
    ///
    /// Lookup order: `explicit`, then `$ALFRED_CONFIG`, then the default
    /// path. An explicit or env-provided file must exist; a missing default
    /// file yields the built-in defaults. The result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::load_from(explicit, from_env, &Self::default_config_path())
    }

    fn load_from(
        explicit: Option<&Path>,
        from_env: Option<PathBuf>,
        default_path: &Path,
    ) -> Result<Self> {
        let config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the drivers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(TaskError::Config(
                "scheduler.tick_interval_secs must be positive".to_owned(),
            ));
        }
        if self.patrol.interval_secs == 0 {
            return Err(TaskError::Config(
                "patrol.interval_secs must be positive".to_owned(),
            ));
        }
        if self.patrol.summary_hour > 23 {
            return Err(TaskError::Config(format!(
                "patrol.summary_hour must be 0-23, got {}",
                self.patrol.summary_hour
            )));
        }
        Ok(())
    }
}
