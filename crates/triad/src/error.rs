//! Error types for the Triad application.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use triad_core::TriadError;

/// Errors raised while reading or writing a settings file.
#[derive(Debug)]
pub enum SettingsError {
    /// The file could not be read or written.
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The file contents could not be parsed.
    Parse {
        /// The file involved.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },
    /// The settings could not be encoded.
    Serialize {
        /// The file involved.
        path: PathBuf,
        /// The encoder's message.
        message: String,
    },
    /// The file extension does not name a supported format.
    UnsupportedFormat {
        /// The file involved.
        path: PathBuf,
    },
}

impl SettingsError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, message: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub(crate) fn serialize(path: &Path, message: impl fmt::Display) -> Self {
        Self::Serialize {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// The file the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Serialize { path, .. }
            | Self::UnsupportedFormat { path } => path,
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on '{}': {source}", path.display()),
            Self::Parse { path, message } => {
                write!(f, "Failed to parse '{}': {message}", path.display())
            }
            Self::Serialize { path, message } => {
                write!(f, "Failed to encode settings for '{}': {message}", path.display())
            }
            Self::UnsupportedFormat { path } => write!(
                f,
                "Unsupported settings format for '{}' (expected .toml or .json)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised while loading the application configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The configuration file is not valid TOML for [`AppConfig`](crate::AppConfig).
    Parse {
        /// The file involved.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to read config '{}': {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "Invalid config '{}': {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

/// Errors raised while installing the log subscriber.
#[derive(Debug)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    AlreadyInitialized,
    /// The filter directive could not be parsed.
    InvalidFilter(String),
    /// The log file could not be opened.
    Io {
        /// The log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "Logging is already initialized"),
            Self::InvalidFilter(msg) => write!(f, "Invalid log filter: {msg}"),
            Self::Io { path, source } => {
                write!(f, "Failed to open log file '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The top-level application error.
#[derive(Debug)]
pub enum AppError {
    /// Error from the core runtime.
    Core(TriadError),
    /// Settings persistence error.
    Settings(SettingsError),
    /// Configuration error.
    Config(ConfigError),
    /// Logging setup error.
    Logging(LoggingError),
    /// Terminal I/O error.
    Io(io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(err) => write!(f, "{err}"),
            Self::Settings(err) => write!(f, "Settings error: {err}"),
            Self::Config(err) => write!(f, "Configuration error: {err}"),
            Self::Logging(err) => write!(f, "Logging error: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<TriadError> for AppError {
    fn from(err: TriadError) -> Self {
        Self::Core(err)
    }
}

impl From<triad_core::ModelError> for AppError {
    fn from(err: triad_core::ModelError) -> Self {
        Self::Core(err.into())
    }
}

impl From<triad_core::ControllerError> for AppError {
    fn from(err: triad_core::ControllerError) -> Self {
        Self::Core(err.into())
    }
}

impl From<triad_core::ViewError> for AppError {
    fn from(err: triad_core::ViewError) -> Self {
        Self::Core(err.into())
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<LoggingError> for AppError {
    fn from(err: LoggingError) -> Self {
        Self::Logging(err)
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A specialized Result type for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_settings_error_carries_path() {
        let err = SettingsError::parse(Path::new("settings.toml"), "expected `=`");
        assert_eq!(err.path(), Path::new("settings.toml"));
        assert!(err.to_string().contains("settings.toml"));
    }

    #[test]
    fn test_app_error_source_chain() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::from(SettingsError::io(Path::new("/etc/triad.toml"), io));
        let source = err.source().unwrap();
        assert!(source.source().is_some());
    }

    #[test]
    fn test_core_errors_convert() {
        let err = AppError::from(triad_core::ControllerError::NoModel);
        assert!(matches!(err, AppError::Core(TriadError::Controller(_))));
    }
}
