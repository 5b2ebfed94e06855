//! Application configuration.
//!
//! The configuration is a TOML file with one table per concern. Every field
//! has a default, so an empty file (or no file at all) is a valid
//! configuration:
//!
//! ```toml
//! settings_path = "/home/me/.config/triad/settings.toml"
//!
//! [application]
//! name = "Triad"
//! title = "Triad Simple Template"
//!
//! [status]
//! tick_interval_secs = 30
//!
//! [work]
//! save_ms = 600
//!
//! [logging]
//! level = "debug"
//! file = "triad.log"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the configuration inside the project config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// File name of the settings file inside the project config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity of the application.
    #[serde(default)]
    pub application: ApplicationSection,

    /// Periodic status refresh.
    #[serde(default)]
    pub status: StatusSection,

    /// Durations of the simulated document operations.
    #[serde(default)]
    pub work: WorkSection,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where user settings are persisted. Defaults to the project config
    /// directory.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl AppConfig {
    /// Parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Load `config.toml` from the project config directory, falling back
    /// to the defaults if it does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let Some(path) = defaults.project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME)) else {
            return Ok(defaults);
        };
        if !path.exists() {
            tracing::debug!(target: "triad::config", path = %path.display(), "no config file, using defaults");
            return Ok(defaults);
        }
        Self::load(path)
    }

    /// The platform directories for this application, if a home directory
    /// can be determined.
    pub fn project_dirs(&self) -> Option<ProjectDirs> {
        ProjectDirs::from("", &self.application.organization, &self.application.name)
    }

    /// The settings file to use: `settings_path` if set, otherwise
    /// `settings.toml` in the project config directory.
    pub fn default_settings_path(&self) -> Option<PathBuf> {
        self.settings_path.clone().or_else(|| {
            self.project_dirs()
                .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
        })
    }
}

/// Identity of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSection {
    /// Short application name.
    pub name: String,
    /// Version string shown in the window title.
    pub version: String,
    /// Human-readable title.
    pub title: String,
    /// Organization used for the platform directories.
    pub organization: String,
}

impl Default for ApplicationSection {
    fn default() -> Self {
        Self {
            name: "Triad".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: "Triad Simple Template".to_string(),
            organization: "Triad".to_string(),
        }
    }
}

/// Periodic status refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    /// Seconds between "Ready - HH:MM:SS" refreshes. Zero disables the ticker.
    pub tick_interval_secs: u64,
    /// Status shown when nothing is happening.
    pub ready_message: String,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            ready_message: "Ready".to_string(),
        }
    }
}

impl StatusSection {
    /// The ticker interval, or `None` if the ticker is disabled.
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_secs > 0).then(|| Duration::from_secs(self.tick_interval_secs))
    }
}

/// Durations of the simulated document operations, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkSection {
    /// Creating a new document.
    pub new_ms: u64,
    /// Opening a document.
    pub open_ms: u64,
    /// Saving a document.
    pub save_ms: u64,
    /// The `test` action.
    pub test_ms: u64,
    /// The long-running operation.
    pub long_ms: u64,
}

impl Default for WorkSection {
    fn default() -> Self {
        Self {
            new_ms: 500,
            open_ms: 800,
            save_ms: 600,
            test_ms: 1000,
            long_ms: 3000,
        }
    }
}

impl WorkSection {
    /// All durations set to zero, for tests and scripted runs.
    pub fn instant() -> Self {
        Self {
            new_ms: 0,
            open_ms: 0,
            save_ms: 0,
            test_ms: 0,
            long_ms: 0,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Whether to log to stderr.
    pub console: bool,
    /// Whether console output uses ANSI colors.
    pub ansi: bool,
    /// Optional file that receives a copy of the log.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            ansi: true,
            file: None,
        }
    }
}
