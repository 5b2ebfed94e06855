//! The contract a presentation surface implements.
//!
//! A view receives controller-driven updates through [`View::update_view`],
//! [`View::show_error`] and [`View::show_info`], and reports outward through
//! the three signals in [`ViewSignals`]:
//!
//! - `user_action(name, data)` when the user triggers a named action,
//! - `view_closing()` exactly once when the view is about to be torn down,
//! - `view_update_requested()` as an echo after a successful update.
//!
//! Views do not inherit from a base class. A concrete view embeds a
//! [`ViewBase`] next to whatever native rendering object it owns and returns
//! it from [`View::base`]; the trait's provided methods do the controller
//! bookkeeping through it.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Weak};
//! use triad_core::{View, ViewBase};
//!
//! struct StatusLine {
//!     base: ViewBase,
//! }
//!
//! impl StatusLine {
//!     fn new() -> Arc<Self> {
//!         Arc::new_cyclic(|weak: &Weak<StatusLine>| {
//!             let owner: Weak<dyn View> = weak.clone();
//!             StatusLine { base: ViewBase::new(owner) }
//!         })
//!     }
//! }
//!
//! impl View for StatusLine {
//!     fn base(&self) -> &ViewBase {
//!         &self.base
//!     }
//!
//!     fn update_view(&self) {
//!         if self.base.is_initialized() {
//!             self.base.finish_update();
//!         }
//!     }
//!
//!     fn show_error(&self, message: &str) {
//!         eprintln!("error: {message}");
//!     }
//!
//!     fn show_info(&self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! let view = StatusLine::new();
//! view.initialize().unwrap();
//! assert!(view.is_view_valid());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::controller::{Controller, ControllerState};
use crate::error::ViewError;
use crate::signal::{Signal, Subscription};
use crate::value::Value;

/// Outward notifications of a view.
pub struct ViewSignals {
    /// Emitted with `(action_name, payload)` when the user triggers an action.
    pub user_action: Signal<(String, Value)>,
    /// Emitted once when the view is about to close.
    pub view_closing: Signal<()>,
    /// Emitted after the view finished an update.
    pub view_update_requested: Signal<()>,
}

impl Default for ViewSignals {
    fn default() -> Self {
        Self {
            user_action: Signal::new(),
            view_closing: Signal::new(),
            view_update_requested: Signal::new(),
        }
    }
}

impl fmt::Debug for ViewSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSignals")
            .field("user_action", &self.user_action)
            .field("view_closing", &self.view_closing)
            .field("view_update_requested", &self.view_update_requested)
            .finish()
    }
}

/// A presentation surface driven by a [`Controller`].
///
/// Implementors supply [`base`](Self::base) and the four presentation
/// methods; everything else has a working default built on [`ViewBase`].
pub trait View: Send + Sync {
    /// The embedded bookkeeping shared by all views.
    fn base(&self) -> &ViewBase;

    /// Pull the current model-derived state and re-render.
    ///
    /// Called on every model change, so it must be cheap and safe to repeat.
    fn update_view(&self);

    /// Present an error to the user. Must not block waiting for input.
    fn show_error(&self, message: &str);

    /// Present an informational message to the user. Must not block.
    fn show_info(&self, message: &str);

    /// Prepare presentation state. Idempotent.
    fn initialize(&self) -> Result<(), ViewError> {
        self.base().run_initialize(|| Ok(()))
    }

    /// Record the controller driving this view.
    ///
    /// The view keeps a weak back-reference; the controller owns the view.
    fn set_controller(&self, controller: Option<&Arc<Controller>>) {
        self.base().attach_controller(controller);
    }

    /// The controller driving this view, if it is still alive.
    fn controller(&self) -> Option<Arc<Controller>> {
        self.base().controller()
    }

    /// Reflect controller busy/idle state by enabling or disabling input.
    fn set_view_enabled(&self, enabled: bool) {
        self.base().set_enabled(enabled);
    }

    /// Whether the view is ready for use.
    fn is_view_valid(&self) -> bool {
        self.base().is_initialized()
    }

    /// The view's outward notifications.
    fn signals(&self) -> &ViewSignals {
        self.base().signals()
    }
}

struct Attachment {
    controller: Weak<Controller>,
    subscriptions: Vec<Subscription>,
}

/// Bookkeeping embedded by every concrete view.
///
/// Holds the view's signals, its initialized/enabled flags, and the weak
/// back-reference to its controller together with the subscriptions that
/// route the controller's notifications into the owning view:
///
/// - `error_occurred` → [`View::show_error`]
/// - `operation_completed` → [`View::show_info`]
/// - `state_changed` → [`View::update_view`]
pub struct ViewBase {
    owner: Weak<dyn View>,
    signals: ViewSignals,
    initialized: AtomicBool,
    enabled: AtomicBool,
    closing: AtomicBool,
    attachment: Mutex<Option<Attachment>>,
}

impl ViewBase {
    /// Create the bookkeeping for the view behind `owner`.
    ///
    /// Build the owning view with [`Arc::new_cyclic`] to obtain `owner`.
    pub fn new(owner: Weak<dyn View>) -> Self {
        Self {
            owner,
            signals: ViewSignals::default(),
            initialized: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            attachment: Mutex::new(None),
        }
    }

    /// The view's outward notifications.
    pub fn signals(&self) -> &ViewSignals {
        &self.signals
    }

    /// Run `setup` once; later calls return `Ok(())` without running it.
    ///
    /// The view only counts as initialized if `setup` succeeds.
    pub fn run_initialize<F>(&self, setup: F) -> Result<(), ViewError>
    where
        F: FnOnce() -> Result<(), ViewError>,
    {
        if self.is_initialized() {
            return Ok(());
        }
        setup()?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!(target: "triad_core::view", "view initialized");
        Ok(())
    }

    /// Whether initialization has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether user input is currently accepted.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable user input.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// The controller driving this view, if it is still alive.
    pub fn controller(&self) -> Option<Arc<Controller>> {
        self.attachment
            .lock()
            .as_ref()
            .and_then(|attachment| attachment.controller.upgrade())
    }

    /// Replace the controller back-reference.
    ///
    /// Attaching the controller that is already attached does nothing.
    /// Subscriptions to a previous controller are torn down first.
    pub fn attach_controller(&self, controller: Option<&Arc<Controller>>) {
        let previous = {
            let mut attachment = self.attachment.lock();
            let unchanged = match (attachment.as_ref(), controller) {
                (Some(current), Some(next)) => current.controller.ptr_eq(&Arc::downgrade(next)),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            attachment.take()
        };
        drop(previous);

        let Some(controller) = controller else {
            return;
        };

        let subscriptions = self.subscribe(controller);
        *self.attachment.lock() = Some(Attachment {
            controller: Arc::downgrade(controller),
            subscriptions,
        });
    }

    fn subscribe(&self, controller: &Arc<Controller>) -> Vec<Subscription> {
        let mut subscriptions = Vec::with_capacity(3);

        let owner = self.owner.clone();
        let id = controller.error_occurred().connect(move |message| {
            if let Some(view) = owner.upgrade() {
                view.show_error(message);
            }
        });
        subscriptions.push(Subscription::new(controller, move |c: &Controller| {
            c.error_occurred().disconnect(id);
        }));

        let owner = self.owner.clone();
        let id = controller.operation_completed().connect(move |message| {
            if let Some(view) = owner.upgrade() {
                if !message.is_empty() {
                    view.show_info(message);
                }
            }
        });
        subscriptions.push(Subscription::new(controller, move |c: &Controller| {
            c.operation_completed().disconnect(id);
        }));

        let owner = self.owner.clone();
        let id = controller.state_changed().connect(move |state| {
            if *state == ControllerState::ViewClosing {
                return;
            }
            if let Some(view) = owner.upgrade() {
                view.update_view();
            }
        });
        subscriptions.push(Subscription::new(controller, move |c: &Controller| {
            c.state_changed().disconnect(id);
        }));

        subscriptions
    }

    /// Report a named user action to whoever is listening.
    pub fn report_action(&self, name: &str, data: impl Into<Value>) {
        if !self.is_enabled() {
            tracing::debug!(target: "triad_core::view", action = name, "view disabled, action dropped");
            return;
        }
        self.signals.user_action.emit((name.to_string(), data.into()));
    }

    /// Emit `view_closing`. Only the first call has an effect.
    pub fn notify_closing(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(target: "triad_core::view", "view closing");
        self.signals.view_closing.emit(());
    }

    /// Whether [`notify_closing`](Self::notify_closing) has run.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Emit the `view_update_requested` echo after an update.
    pub fn finish_update(&self) {
        self.signals.view_update_requested.emit(());
    }
}

impl fmt::Debug for ViewBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBase")
            .field("initialized", &self.is_initialized())
            .field("enabled", &self.is_enabled())
            .field("closing", &self.is_closing())
            .field("has_controller", &self.controller().is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(ViewBase: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        base: ViewBase,
        updates: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new_cyclic(|weak: &Weak<Probe>| {
                let owner: Weak<dyn View> = weak.clone();
                Probe {
                    base: ViewBase::new(owner),
                    updates: AtomicUsize::new(0),
                    errors: Mutex::new(Vec::new()),
                }
            })
        }
    }

    impl View for Probe {
        fn base(&self) -> &ViewBase {
            &self.base
        }

        fn update_view(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.base.finish_update();
        }

        fn show_error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }

        fn show_info(&self, _message: &str) {}
    }

    #[test]
    fn test_initialize_runs_setup_once() {
        let view = Probe::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            view.base()
                .run_initialize(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(view.is_view_valid());
    }

    #[test]
    fn test_failed_setup_leaves_view_uninitialized() {
        let view = Probe::new();
        let result = view
            .base()
            .run_initialize(|| Err(ViewError::InitializationFailed("no terminal".into())));
        assert!(result.is_err());
        assert!(!view.is_view_valid());
    }

    #[test]
    fn test_closing_is_emitted_once() {
        let view = Probe::new();
        let closings = Arc::new(AtomicUsize::new(0));

        let closings_clone = closings.clone();
        view.signals().view_closing.connect(move |_| {
            closings_clone.fetch_add(1, Ordering::SeqCst);
        });

        view.base().notify_closing();
        view.base().notify_closing();
        assert_eq!(closings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_view_drops_actions() {
        let view = Probe::new();
        let actions = Arc::new(Mutex::new(Vec::new()));

        let actions_clone = actions.clone();
        view.signals().user_action.connect(move |(name, _)| {
            actions_clone.lock().push(name.clone());
        });

        view.base().report_action("save", Value::Null);
        view.set_view_enabled(false);
        view.base().report_action("open", Value::Null);
        view.set_view_enabled(true);
        view.base().report_action("test", "payload");

        assert_eq!(*actions.lock(), vec!["save", "test"]);
    }

    #[test]
    fn test_controller_errors_reach_show_error() {
        let view = Probe::new();
        let controller = Controller::new(crate::controller::DefaultHooks);

        view.set_controller(Some(&controller));
        controller.emit_error("disk full");

        assert_eq!(*view.errors.lock(), vec!["disk full"]);
        assert!(view.controller().is_some());
    }

    #[test]
    fn test_detaching_controller_stops_forwarding() {
        let view = Probe::new();
        let controller = Controller::new(crate::controller::DefaultHooks);

        view.set_controller(Some(&controller));
        view.set_controller(None);
        controller.emit_error("ignored");

        assert!(view.errors.lock().is_empty());
        assert!(view.controller().is_none());
        assert_eq!(controller.error_occurred().connection_count(), 0);
    }

    #[test]
    fn test_reattaching_same_controller_does_not_duplicate() {
        let view = Probe::new();
        let controller = Controller::new(crate::controller::DefaultHooks);

        view.set_controller(Some(&controller));
        view.set_controller(Some(&controller));

        assert_eq!(controller.error_occurred().connection_count(), 1);
    }
}
