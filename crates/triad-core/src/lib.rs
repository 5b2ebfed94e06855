//! Core runtime for Triad.
//!
//! This crate provides the building blocks of an observer-coordinated
//! model/view/controller application:
//!
//! - **Values**: A dynamically-typed [`Value`] for named properties
//! - **Signal/Slot System**: Type-safe notification channels with direct and
//!   dispatcher-queued delivery
//! - **Property Store**: Thread-safe named properties with change
//!   notification and validation hooks
//! - **Model**: Lifecycle (initialize/reset) and validity over a property store
//! - **Controller**: Binds one model to one view and routes user actions
//! - **View**: The contract a presentation surface implements
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Weak};
//! use triad_core::{Controller, DefaultHooks, Model, NoHooks, View, ViewBase};
//!
//! struct Headless {
//!     base: ViewBase,
//! }
//!
//! impl View for Headless {
//!     fn base(&self) -> &ViewBase {
//!         &self.base
//!     }
//!     fn update_view(&self) {}
//!     fn show_error(&self, _message: &str) {}
//!     fn show_info(&self, _message: &str) {}
//! }
//!
//! let model = Arc::new(Model::new(NoHooks));
//! model.initialize().unwrap();
//!
//! let view = Arc::new_cyclic(|weak: &Weak<Headless>| {
//!     let owner: Weak<dyn View> = weak.clone();
//!     Headless { base: ViewBase::new(owner) }
//! });
//!
//! let controller = Controller::new(DefaultHooks);
//! controller.set_model(Some(model.clone()));
//! controller.set_view(Some(view));
//! controller.initialize().unwrap();
//! assert!(controller.is_valid());
//!
//! model.set("statusMessage", "Saving...");
//! ```

pub mod controller;
pub mod dispatch;
mod error;
pub mod logging;
pub mod model;
pub mod property;
pub mod signal;
mod value;
pub mod view;

pub use controller::{
    Bindings, Controller, ControllerHooks, ControllerState, DefaultHooks, NOT_INITIALIZED, VIEW_UPDATED,
};
pub use dispatch::{Dispatcher, QueuedTask};
pub use error::{ControllerError, ModelError, Result, TriadError, ViewError};
pub use logging::{DumpOptions, PerfSpan, PropertyDump};
pub use model::{Model, ModelHooks, ModelState};
pub use property::{NoHooks, PropertyHooks, PropertyMap, PropertyStore, SetOutcome};
pub use signal::{ConnectionId, ConnectionType, Signal, Subscription};
pub use value::Value;
pub use view::{View, ViewBase, ViewSignals};
