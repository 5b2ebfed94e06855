//! Triad - a template application on the Triad core runtime.
//!
//! This crate supplies everything around the core model/view/controller
//! types that a runnable application needs:
//!
//! - **Configuration**: [`AppConfig`] loaded from TOML, with defaults for
//!   every field
//! - **Settings**: persisted key/value [`Settings`] and the
//!   [`ConfigurationService`] that owns them
//! - **Logging**: [`logging::init`] installs the `tracing` subscriber
//! - **Application**: [`ApplicationModel`], [`ApplicationController`] and a
//!   text [`ConsoleView`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triad::{AppConfig, ApplicationController, ApplicationModel, ConfigurationService, ConsoleView};
//! use triad_core::Dispatcher;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load_or_default()?;
//!     let dispatcher = Dispatcher::new();
//!     let model = Arc::new(ApplicationModel::new(&config));
//!     let service = Arc::new(ConfigurationService::new());
//!
//!     let app = ApplicationController::new(&config, model.clone(), service, Some(dispatcher.clone()))?;
//!     let view = ConsoleView::stdout();
//!     view.set_application_model(model);
//!     app.set_view(view.clone());
//!     app.initialize_application()?;
//!     app.start_application();
//!
//!     view.trigger("save", "");
//!     dispatcher.process_for(std::time::Duration::from_secs(1));
//!     app.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod settings;
pub mod view;
pub mod worker;

pub use config::{AppConfig, ApplicationSection, LoggingConfig, StatusSection, WorkSection};
pub use controller::ApplicationController;
pub use error::{AppError, AppResult, ConfigError, LoggingError, SettingsError};
pub use logging::LoggingGuard;
pub use model::ApplicationModel;
pub use service::ConfigurationService;
pub use settings::{Settings, SettingsFormat};
pub use view::ConsoleView;
pub use worker::{Ticker, Worker};
