//! Models: property stores with an initialization lifecycle.
//!
//! A [`Model`] owns a [`PropertyStore`] and a [`ModelHooks`] strategy object
//! supplied by the concrete model. The hooks populate default properties,
//! validate the current properties, and may veto or observe writes.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize()--> Initialized
//!                                     |  ^
//!                                     +--+ reset()
//! ```
//!
//! - [`Model::initialize`] is idempotent: on an initialized model it returns
//!   `Ok(())` and does nothing.
//! - [`Model::reset`] repopulates the defaults and keeps the current state.
//! - [`Model::is_valid`] is recomputed on every call.
//!
//! # Notifications
//!
//! For a write that changes the model, slots observe, in order:
//! `property_changed(name, value)`, `data_changed()`, `validity_changed(valid)`.
//!
//! # Example
//!
//! ```
//! use triad_core::{Model, ModelError, ModelHooks, PropertyHooks, PropertyMap, PropertyStore, Value};
//!
//! struct Counter;
//!
//! impl PropertyHooks for Counter {
//!     fn before_set(&self, name: &str, value: &Value) -> bool {
//!         name != "count" || value.as_integer().is_some_and(|n| n >= 0)
//!     }
//! }
//!
//! impl ModelHooks for Counter {
//!     fn populate(&self, properties: &mut PropertyMap) -> Result<(), ModelError> {
//!         properties.insert("count".into(), Value::from(0));
//!         Ok(())
//!     }
//! }
//!
//! let model = Model::new(Counter);
//! model.initialize().unwrap();
//! assert!(model.set("count", 3).is_changed());
//! assert!(!model.set("count", -1).is_accepted());
//! assert_eq!(model.get("count"), Value::from(3));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ModelError;
use crate::property::{NoHooks, PropertyHooks, PropertyMap, PropertyStore, SetOutcome};
use crate::signal::Signal;
use crate::value::Value;

/// Where a model is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    /// Created, defaults not populated yet.
    #[default]
    Uninitialized,
    /// Defaults populated; the model may be valid.
    Initialized,
}

/// The strategy object a concrete model supplies.
///
/// Every method has a default, so a model that only needs free-form
/// properties can use [`NoHooks`].
pub trait ModelHooks: PropertyHooks {
    /// Fill `properties` with the model's defaults.
    ///
    /// Called by [`Model::initialize`] and [`Model::reset`]. The map starts
    /// empty and replaces the store's contents only if this returns `Ok`.
    fn populate(&self, properties: &mut PropertyMap) -> Result<(), ModelError> {
        let _ = properties;
        Ok(())
    }

    /// Whether the current properties form a valid model.
    ///
    /// Must be pure: it runs after every successful write.
    fn validate(&self, store: &PropertyStore) -> bool {
        let _ = store;
        true
    }
}

impl ModelHooks for NoHooks {}

/// A property-bearing model with an initialization lifecycle.
pub struct Model {
    store: PropertyStore,
    hooks: Arc<dyn ModelHooks>,
    /// Lifecycle lock; separate from the store's property lock.
    state: Mutex<ModelState>,
    validity_changed: Signal<bool>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(NoHooks)
    }
}

impl Model {
    /// Create an uninitialized model driven by `hooks`.
    pub fn new(hooks: impl ModelHooks + 'static) -> Self {
        Self::with_shared_hooks(Arc::new(hooks))
    }

    /// Create a model whose hooks are also held elsewhere.
    ///
    /// Concrete models use this to keep typed access to their hooks, for
    /// example to reach model-specific signals.
    pub fn with_shared_hooks(hooks: Arc<dyn ModelHooks>) -> Self {
        Self {
            store: PropertyStore::new(),
            hooks,
            state: Mutex::new(ModelState::Uninitialized),
            validity_changed: Signal::new(),
        }
    }

    /// Populate defaults and become initialized.
    ///
    /// Returns `Ok(())` without side effects if already initialized. On
    /// failure the model stays uninitialized, its properties are untouched,
    /// and no notification is emitted.
    #[tracing::instrument(skip(self), target = "triad_core::model", level = "debug")]
    pub fn initialize(&self) -> Result<(), ModelError> {
        if self.is_initialized() {
            return Ok(());
        }

        // Populate without the lifecycle lock; hooks may query the model.
        let defaults = self.populate_defaults()?;
        {
            let mut state = self.state.lock();
            if *state == ModelState::Initialized {
                return Ok(());
            }
            self.store.replace_all(defaults);
            *state = ModelState::Initialized;
        }

        tracing::debug!(target: "triad_core::model", properties = self.store.len(), "model initialized");
        self.emit_reloaded();
        Ok(())
    }

    /// Repopulate the defaults without changing the lifecycle state.
    ///
    /// On failure the previous properties are kept and nothing is emitted.
    #[tracing::instrument(skip(self), target = "triad_core::model", level = "debug")]
    pub fn reset(&self) -> Result<(), ModelError> {
        let defaults = self.populate_defaults()?;
        {
            let _state = self.state.lock();
            self.store.replace_all(defaults);
        }

        crate::triad_debug!(properties = self.store.len(), "model reset");
        self.emit_reloaded();
        Ok(())
    }

    fn populate_defaults(&self) -> Result<PropertyMap, ModelError> {
        let mut defaults = PropertyMap::new();
        self.hooks.populate(&mut defaults).inspect_err(|err| {
            tracing::warn!(target: "triad_core::model", error = %err, "populating defaults failed");
        })?;
        Ok(defaults)
    }

    fn emit_reloaded(&self) {
        self.store.data_changed.emit(());
        self.validity_changed.emit(self.is_valid());
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ModelState {
        *self.state.lock()
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.state() == ModelState::Initialized
    }

    /// Whether the model is initialized and its hooks accept the current
    /// properties.
    pub fn is_valid(&self) -> bool {
        self.is_initialized() && self.hooks.validate(&self.store)
    }

    /// Get a property, or [`Value::Null`] if it does not exist.
    pub fn get(&self, name: &str) -> Value {
        self.store.get(name)
    }

    /// Set a property through the model's hooks.
    ///
    /// On [`SetOutcome::Changed`], `validity_changed` is emitted after the
    /// store's own notifications.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> SetOutcome {
        let outcome = self.store.set_with(name, value.into(), self.hooks.as_ref());
        if outcome.is_changed() {
            self.validity_changed.emit(self.is_valid());
        }
        outcome
    }

    /// Store a value without hooks or notifications.
    ///
    /// Reserved for internal default population.
    pub fn set_silent(&self, name: &str, value: impl Into<Value>) {
        self.store.set_silent(name, value);
    }

    /// Whether a property exists.
    pub fn has(&self, name: &str) -> bool {
        self.store.has(name)
    }

    /// All property names.
    pub fn names(&self) -> BTreeSet<String> {
        self.store.names()
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the model holds no properties.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every property without notifications.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// A consistent copy of all properties.
    pub fn snapshot(&self) -> PropertyMap {
        self.store.snapshot()
    }

    /// The underlying store.
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Emitted with `(name, new_value)` when a property changes.
    pub fn property_changed(&self) -> &Signal<(String, Value)> {
        &self.store.property_changed
    }

    /// Emitted after any change, including initialization and reset.
    pub fn data_changed(&self) -> &Signal<()> {
        &self.store.data_changed
    }

    /// Emitted with the recomputed validity after any change.
    pub fn validity_changed(&self) -> &Signal<bool> {
        &self.validity_changed
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("state", &self.state())
            .field("properties", &self.store.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Model: Send, Sync);
