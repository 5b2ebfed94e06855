//! Log subscriber installation.
//!
//! The core crate only emits `tracing` events; this module installs the
//! global subscriber that renders them. `RUST_LOG` takes precedence over the
//! configured level, so `RUST_LOG=triad_core::controller=trace` narrows the
//! output to one subsystem.

use std::fs::{File, OpenOptions};
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Target for application-level events.
pub const APP_TARGET: &str = "triad::app";

/// Keeps the log file open for the lifetime of the application.
///
/// Dropping the guard syncs the log file to disk.
#[derive(Debug)]
#[must_use = "dropping the guard closes the log file"]
pub struct LoggingGuard {
    file: Option<Arc<File>>,
}

impl LoggingGuard {
    /// Whether a log file is being written.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all();
        }
    }
}

/// Build the filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|err| LoggingError::InvalidFilter(err.to_string())),
    }
}

/// Install the global subscriber described by `config`.
///
/// Only one subscriber can be installed per process; later calls return
/// [`LoggingError::AlreadyInitialized`].
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::Io {
                    path: path.clone(),
                    source,
                })?;
            Some(Arc::new(file))
        }
        None => None,
    };

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(true)
    });
    let file_layer = file
        .clone()
        .map(|file| fmt::layer().with_writer(file).with_ansi(false).with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::debug!(target: APP_TARGET, level = %config.level, file = ?config.file, "logging initialized");
    Ok(LoggingGuard { file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(
            build_filter("triad=verbose"),
            Err(LoggingError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            console: false,
            file: Some(dir.path().join("triad.log")),
            ..Default::default()
        };

        let first = init(&config);
        let second = init(&config);

        assert!(matches!(second, Err(LoggingError::AlreadyInitialized)));
        if let Ok(guard) = first {
            assert!(guard.has_file());
        }
    }
}
