//! The controller lifecycle.
//!
//! A [`Controller`] binds one [`Model`] and one [`View`], drives the view
//! from model notifications, and routes the view's user actions. Behavior
//! that differs between applications lives in a [`ControllerHooks`]
//! implementation; the controller itself only keeps the state machine and
//! the subscriptions.
//!
//! # States
//!
//! ```text
//! Unbound ──set_model/set_view──▶ Bound ──initialize──▶ Initialized
//!                                                           │
//!                                          view_closing     ▼
//!                                                      ViewClosing
//! ```
//!
//! `ViewClosing` ends the session; binding a different view starts a new one.
//!
//! # Ownership
//!
//! The controller holds shared `Arc` references to its model and view; the
//! application keeps its own handles and may bind the same model elsewhere.
//! The view holds only a weak back-reference, and every subscription the
//! controller installs is a [`Subscription`] that is dropped on rebind, so a
//! detached model can never reach the controller again.

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::dispatch::Dispatcher;
use crate::error::ControllerError;
use crate::model::Model;
use crate::signal::{ConnectionType, Signal, Subscription};
use crate::value::Value;
use crate::view::View;

/// Message emitted when an action reaches a controller that is not initialized.
pub const NOT_INITIALIZED: &str = "Controller not initialized";

/// Message emitted after the built-in `refresh`/`update` actions.
pub const VIEW_UPDATED: &str = "View updated";

/// Lifecycle state of a [`Controller`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControllerState {
    /// Model or view missing, not initialized.
    Unbound,
    /// Model and view bound, not yet initialized.
    Bound,
    /// Initialized; actions are accepted.
    Initialized,
    /// The view announced it is closing. Actions are rejected.
    ViewClosing,
}

/// Application-specific controller behavior.
///
/// Every method has a default, so an implementation overrides only what it
/// needs. Hooks receive the controller and may call back into it freely; no
/// controller lock is held while a hook runs.
pub trait ControllerHooks: Send + Sync {
    /// Controller-specific setup run by [`Controller::initialize`].
    fn initialize_controller(&self, controller: &Controller) -> Result<(), ControllerError> {
        let _ = controller;
        Ok(())
    }

    /// Install extra model↔view subscriptions.
    ///
    /// Whatever is pushed into `bindings` is torn down on the next rebind.
    fn connect_model_and_view(&self, controller: &Controller, bindings: &mut Bindings) {
        let _ = (controller, bindings);
    }

    /// Handle a named user action. Return `true` if it was handled.
    fn handle_action(&self, controller: &Controller, name: &str, data: &Value) -> bool {
        let _ = (controller, name, data);
        false
    }

    /// Extra validity condition on top of initialization.
    fn validate_controller(&self, controller: &Controller) -> bool {
        controller.model().is_some() && controller.view().is_some()
    }

    /// Recompute derived presentation state before the view re-renders.
    ///
    /// Runs inside every [`Controller::update_view`]; it must not mutate the
    /// bound model.
    fn update_controller_state(&self, controller: &Controller) {
        let _ = controller;
    }

    /// Called when the bound model reports a data change.
    fn on_model_data_changed(&self, controller: &Controller) {
        controller.update_view();
    }

    /// Called when the view echoes `view_update_requested`.
    ///
    /// The echo follows every view update, so the default does nothing.
    fn on_view_update_requested(&self, controller: &Controller) {
        let _ = controller;
    }

    /// Called once before the controller enters [`ControllerState::ViewClosing`].
    fn on_view_closing(&self, controller: &Controller) {
        let _ = controller;
    }
}

/// Hooks that keep every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ControllerHooks for DefaultHooks {}

/// Model↔view subscriptions installed by
/// [`ControllerHooks::connect_model_and_view`].
#[derive(Debug, Default)]
pub struct Bindings {
    subscriptions: Vec<Subscription>,
}

impl Bindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the next rebind.
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Number of bindings held.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no bindings are held.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop every binding, disconnecting it.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

#[derive(Default)]
struct Inner {
    model: Option<Arc<Model>>,
    view: Option<Arc<dyn View>>,
    initialized: bool,
    closing: bool,
    model_subscriptions: Vec<Subscription>,
    view_subscriptions: Vec<Subscription>,
    bindings: Bindings,
}

impl Inner {
    fn state(&self) -> ControllerState {
        if self.closing {
            ControllerState::ViewClosing
        } else if self.initialized {
            ControllerState::Initialized
        } else if self.model.is_some() && self.view.is_some() {
            ControllerState::Bound
        } else {
            ControllerState::Unbound
        }
    }
}

/// Coordinates one model and one view.
///
/// Controllers are always shared: constructors return `Arc<Controller>` so
/// that views can hold a weak back-reference and subscriptions can reach the
/// controller without keeping it alive.
pub struct Controller {
    this: Weak<Controller>,
    hooks: Arc<dyn ControllerHooks>,
    dispatcher: Option<Dispatcher>,
    inner: Mutex<Inner>,
    state_changed: Signal<ControllerState>,
    error_occurred: Signal<String>,
    operation_completed: Signal<String>,
}

impl Controller {
    /// Create a controller with the given hooks.
    pub fn new(hooks: impl ControllerHooks + 'static) -> Arc<Self> {
        Self::build(Arc::new(hooks), None)
    }

    /// Create a controller whose model notifications are delivered through
    /// `dispatcher`.
    ///
    /// Model changes made on a worker thread are then posted to the
    /// dispatcher's owner thread before they reach the view.
    pub fn with_dispatcher(hooks: impl ControllerHooks + 'static, dispatcher: Dispatcher) -> Arc<Self> {
        Self::build(Arc::new(hooks), Some(dispatcher))
    }

    /// Create a controller from hooks the caller keeps a handle to.
    pub fn with_shared_hooks(hooks: Arc<dyn ControllerHooks>, dispatcher: Option<Dispatcher>) -> Arc<Self> {
        Self::build(hooks, dispatcher)
    }

    fn build(hooks: Arc<dyn ControllerHooks>, dispatcher: Option<Dispatcher>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            hooks,
            dispatcher,
            inner: Mutex::new(Inner::default()),
            state_changed: Signal::new(),
            error_occurred: Signal::new(),
            operation_completed: Signal::new(),
        })
    }

    /// Bind `model`, replacing any previous one.
    ///
    /// Binding the model that is already bound does nothing.
    #[tracing::instrument(skip_all, target = "triad_core::controller", level = "debug")]
    pub fn set_model(&self, model: Option<Arc<Model>>) {
        let (old_subscriptions, old_bindings) = {
            let mut inner = self.inner.lock();
            if same_model(inner.model.as_ref(), model.as_ref()) {
                return;
            }
            inner.model = model.clone();
            (
                mem::take(&mut inner.model_subscriptions),
                mem::take(&mut inner.bindings),
            )
        };
        drop(old_subscriptions);
        drop(old_bindings);

        if let Some(model) = &model {
            let subscriptions = self.subscribe_model(model);
            self.inner.lock().model_subscriptions = subscriptions;
        }
        tracing::debug!(target: "triad_core::controller", bound = model.is_some(), "model changed");

        self.rebind_if_ready();
        self.emit_state_changed();
    }

    /// Bind `view`, replacing any previous one.
    ///
    /// The replaced view is detached from this controller; the new view is
    /// given a back-reference to it. Binding a different view after the
    /// previous one closed starts a new session.
    #[tracing::instrument(skip_all, target = "triad_core::controller", level = "debug")]
    pub fn set_view(&self, view: Option<Arc<dyn View>>) {
        let (old_view, old_subscriptions, old_bindings) = {
            let mut inner = self.inner.lock();
            if same_view(inner.view.as_ref(), view.as_ref()) {
                return;
            }
            inner.closing = false;
            (
                mem::replace(&mut inner.view, view.clone()),
                mem::take(&mut inner.view_subscriptions),
                mem::take(&mut inner.bindings),
            )
        };
        drop(old_subscriptions);
        drop(old_bindings);

        if let Some(old_view) = old_view {
            let attached_here = old_view
                .controller()
                .is_some_and(|controller| std::ptr::eq(Arc::as_ptr(&controller), self));
            if attached_here {
                old_view.set_controller(None);
            }
        }

        if let Some(view) = &view {
            let subscriptions = self.subscribe_view(view);
            self.inner.lock().view_subscriptions = subscriptions;
            if let Some(this) = self.this.upgrade() {
                view.set_controller(Some(&this));
            }
        }
        tracing::debug!(target: "triad_core::controller", bound = view.is_some(), "view changed");

        self.rebind_if_ready();
        self.emit_state_changed();
    }

    /// Run controller setup. Idempotent.
    ///
    /// On failure the controller stays in its previous state and the error
    /// is returned.
    #[tracing::instrument(skip_all, target = "triad_core::controller", level = "debug")]
    pub fn initialize(&self) -> Result<(), ControllerError> {
        if self.inner.lock().initialized {
            return Ok(());
        }

        self.hooks.initialize_controller(self).inspect_err(|err| {
            tracing::warn!(target: "triad_core::controller", error = %err, "controller initialization failed");
        })?;

        let ready = {
            let mut inner = self.inner.lock();
            inner.initialized = true;
            inner.model.is_some() && inner.view.is_some()
        };
        if ready {
            self.establish_bindings();
        }

        tracing::debug!(target: "triad_core::controller", "controller initialized");
        self.emit_state_changed();
        Ok(())
    }

    /// Route a named user action.
    ///
    /// An uninitialized or closing controller emits exactly one
    /// [`NOT_INITIALIZED`] error and does nothing else.
    pub fn handle_user_action(&self, name: &str, data: &Value) {
        if self.state() != ControllerState::Initialized {
            tracing::warn!(target: "triad_core::controller", action = name, "action on uninitialized controller");
            self.emit_error(NOT_INITIALIZED);
            return;
        }

        if self.hooks.handle_action(self, name, data) {
            return;
        }

        match name {
            "refresh" | "update" => {
                self.update_view();
                self.emit_operation_completed(VIEW_UPDATED);
            }
            _ => {
                tracing::debug!(target: "triad_core::controller", action = name, data = %data, "unhandled user action");
            }
        }
    }

    /// Recompute derived state and re-render the view, if one is bound.
    pub fn update_view(&self) {
        let Some(view) = self.view() else {
            return;
        };
        self.hooks.update_controller_state(self);
        view.update_view();
    }

    /// React to the view announcing that it closes.
    #[tracing::instrument(skip_all, target = "triad_core::controller", level = "debug")]
    pub fn handle_view_closing(&self) {
        if self.inner.lock().closing {
            return;
        }
        self.hooks.on_view_closing(self);
        self.inner.lock().closing = true;
        self.emit_state_changed();
    }

    /// Report a runtime error to listeners.
    pub fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "triad_core::controller", %message, "controller error");
        self.error_occurred.emit(message);
    }

    /// Report a finished operation to listeners.
    pub fn emit_operation_completed(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "triad_core::controller", %message, "operation completed");
        self.operation_completed.emit(message);
    }

    /// Whether the controller is initialized and its hooks consider it valid.
    pub fn is_valid(&self) -> bool {
        self.state() == ControllerState::Initialized && self.hooks.validate_controller(self)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.inner.lock().state()
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// The bound model.
    pub fn model(&self) -> Option<Arc<Model>> {
        self.inner.lock().model.clone()
    }

    /// The bound view.
    pub fn view(&self) -> Option<Arc<dyn View>> {
        self.inner.lock().view.clone()
    }

    /// A weak handle to this controller, for callbacks that outlive the
    /// current call.
    pub fn downgrade(&self) -> Weak<Controller> {
        self.this.clone()
    }

    /// The dispatcher model notifications are delivered through, if any.
    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_ref()
    }

    /// Number of hook-installed model↔view bindings currently held.
    pub fn binding_count(&self) -> usize {
        self.inner.lock().bindings.len()
    }

    /// Emitted on every lifecycle transition and rebind.
    pub fn state_changed(&self) -> &Signal<ControllerState> {
        &self.state_changed
    }

    /// Emitted with a message when an operation fails.
    pub fn error_occurred(&self) -> &Signal<String> {
        &self.error_occurred
    }

    /// Emitted with a message when an operation finishes.
    pub fn operation_completed(&self) -> &Signal<String> {
        &self.operation_completed
    }

    fn emit_state_changed(&self) {
        let state = self.state();
        tracing::trace!(target: "triad_core::controller", ?state, "state changed");
        self.state_changed.emit(state);
    }

    fn rebind_if_ready(&self) {
        let ready = {
            let inner = self.inner.lock();
            inner.initialized && inner.model.is_some() && inner.view.is_some()
        };
        if ready {
            self.establish_bindings();
        }
    }

    fn establish_bindings(&self) {
        let mut bindings = Bindings::new();
        self.hooks.connect_model_and_view(self, &mut bindings);
        let previous = mem::replace(&mut self.inner.lock().bindings, bindings);
        drop(previous);
    }

    fn subscribe_model(&self, model: &Arc<Model>) -> Vec<Subscription> {
        let this = self.this.clone();
        let on_data_changed = move |_: &()| {
            if let Some(controller) = this.upgrade() {
                controller.hooks.on_model_data_changed(&controller);
            }
        };
        let id = match &self.dispatcher {
            Some(dispatcher) => model
                .data_changed()
                .connect_queued(dispatcher, ConnectionType::Auto, on_data_changed),
            None => model.data_changed().connect(on_data_changed),
        };
        vec![Subscription::new(model, move |m: &Model| {
            m.data_changed().disconnect(id);
        })]
    }

    fn subscribe_view(&self, view: &Arc<dyn View>) -> Vec<Subscription> {
        let signals = view.signals();
        let mut subscriptions = Vec::with_capacity(3);

        let this = self.this.clone();
        let id = signals.user_action.connect(move |(name, data)| {
            if let Some(controller) = this.upgrade() {
                controller.handle_user_action(name, data);
            }
        });
        subscriptions.push(Subscription::new::<dyn View, _>(view, move |v| {
            v.signals().user_action.disconnect(id);
        }));

        let this = self.this.clone();
        let id = signals.view_closing.connect(move |_| {
            if let Some(controller) = this.upgrade() {
                controller.handle_view_closing();
            }
        });
        subscriptions.push(Subscription::new::<dyn View, _>(view, move |v| {
            v.signals().view_closing.disconnect(id);
        }));

        let this = self.this.clone();
        let id = signals.view_update_requested.connect(move |_| {
            if let Some(controller) = this.upgrade() {
                controller.hooks.on_view_update_requested(&controller);
            }
        });
        subscriptions.push(Subscription::new::<dyn View, _>(view, move |v| {
            v.signals().view_update_requested.disconnect(id);
        }));

        subscriptions
    }
}

fn same_model(current: Option<&Arc<Model>>, next: Option<&Arc<Model>>) -> bool {
    match (current, next) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_view(current: Option<&Arc<dyn View>>, next: Option<&Arc<dyn View>>) -> bool {
    match (current, next) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Controller")
            .field("state", &inner.state())
            .field("has_model", &inner.model.is_some())
            .field("has_view", &inner.view.is_some())
            .field("bindings", &inner.bindings.len())
            .field("dispatched", &self.dispatcher.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Controller: Send, Sync);
