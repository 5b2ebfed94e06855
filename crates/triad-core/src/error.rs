//! Error types for Triad.
//!
//! Rejected property writes are not errors (see [`SetOutcome`](crate::SetOutcome)),
//! and runtime failures inside a running controller are reported through its
//! `error_occurred` signal. The types here cover the lifecycle calls that
//! return to a caller: initializing models, controllers and views.

use std::fmt;

/// The main error type for Triad operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriadError {
    /// Model-related error.
    Model(ModelError),
    /// Controller-related error.
    Controller(ControllerError),
    /// View-related error.
    View(ViewError),
}

impl fmt::Display for TriadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(err) => write!(f, "Model error: {err}"),
            Self::Controller(err) => write!(f, "Controller error: {err}"),
            Self::View(err) => write!(f, "View error: {err}"),
        }
    }
}

impl std::error::Error for TriadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Controller(err) => Some(err),
            Self::View(err) => Some(err),
        }
    }
}

impl From<ModelError> for TriadError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

impl From<ControllerError> for TriadError {
    fn from(err: ControllerError) -> Self {
        Self::Controller(err)
    }
}

impl From<ViewError> for TriadError {
    fn from(err: ViewError) -> Self {
        Self::View(err)
    }
}

/// Model-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Populating the model's default properties failed.
    InitializationFailed(String),
    /// A property required by the model is missing.
    MissingProperty {
        /// The name of the missing property.
        name: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "Model initialization failed: {msg}"),
            Self::MissingProperty { name } => write!(f, "Required property '{name}' is missing"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Controller-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Controller-specific setup failed.
    InitializationFailed(String),
    /// The operation needs a model and none is bound.
    NoModel,
    /// The operation needs a view and none is bound.
    NoView,
    /// The bound model failed to initialize.
    Model(ModelError),
    /// The bound view failed to initialize.
    View(ViewError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => {
                write!(f, "Controller initialization failed: {msg}")
            }
            Self::NoModel => write!(f, "No model is bound to the controller"),
            Self::NoView => write!(f, "No view is bound to the controller"),
            Self::Model(err) => write!(f, "{err}"),
            Self::View(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::View(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for ControllerError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

impl From<ViewError> for ControllerError {
    fn from(err: ViewError) -> Self {
        Self::View(err)
    }
}

/// View-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// Preparing the presentation state failed.
    InitializationFailed(String),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "View initialization failed: {msg}"),
        }
    }
}

impl std::error::Error for ViewError {}

/// A specialized Result type for Triad operations.
pub type Result<T> = std::result::Result<T, TriadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display() {
        let err = ModelError::InitializationFailed("no defaults".into());
        assert_eq!(err.to_string(), "Model initialization failed: no defaults");

        let err = TriadError::from(ControllerError::NoView);
        assert_eq!(
            err.to_string(),
            "Controller error: No view is bound to the controller"
        );
    }

    #[test]
    fn test_source_chain() {
        let err = ControllerError::from(ModelError::MissingProperty {
            name: "appName".into(),
        });
        assert!(err.source().is_some());
        assert!(ControllerError::NoModel.source().is_none());
    }
}
