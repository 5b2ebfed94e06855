//! Thread-safe named property storage.
//!
//! A [`PropertyStore`] maps property names to [`Value`]s behind a single
//! mutex and publishes two notifications when a write changes something:
//! `property_changed(name, new_value)` followed by `data_changed()`.
//!
//! Writes go through optional [`PropertyHooks`]:
//!
//! - `before_set` runs while the store is locked and may veto the write.
//!   It only sees the proposed value and must not touch the store.
//! - `after_set` runs after the lock is released, so it may read or write the
//!   store again without deadlocking.
//!
//! # Example
//!
//! ```
//! use triad_core::{PropertyStore, SetOutcome, Value};
//!
//! let store = PropertyStore::new();
//! store.property_changed.connect(|(name, value)| {
//!     println!("{name} is now {value}");
//! });
//!
//! assert_eq!(store.set("theme", "dark"), SetOutcome::Changed);
//! assert_eq!(store.set("theme", "dark"), SetOutcome::Unchanged);
//! assert_eq!(store.get("theme"), Value::from("dark"));
//! assert!(store.get("missing").is_null());
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use parking_lot::Mutex;

use crate::signal::Signal;
use crate::value::Value;

/// The result of a property write.
///
/// An unchanged write and a rejected write are both "not a change", but only
/// the rejected one means the caller's value was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was stored and notifications were emitted.
    Changed,
    /// The value was accepted but equal to the stored one; nothing happened.
    Unchanged,
    /// A `before_set` hook refused the value; nothing happened.
    Rejected,
}

impl SetOutcome {
    /// Whether the write was accepted (changed or redundant).
    pub fn is_accepted(self) -> bool {
        !matches!(self, SetOutcome::Rejected)
    }

    /// Whether the write changed the store.
    pub fn is_changed(self) -> bool {
        matches!(self, SetOutcome::Changed)
    }
}

/// Mutation hooks applied by [`PropertyStore::set_with`].
pub trait PropertyHooks: Send + Sync {
    /// Decide whether `value` may be written to `name`.
    ///
    /// Called with the store locked. Must not access the store.
    fn before_set(&self, name: &str, value: &Value) -> bool {
        let _ = (name, value);
        true
    }

    /// Observe a write that changed the store.
    ///
    /// Called with the store unlocked, before the store's own notifications.
    fn after_set(&self, name: &str, old: &Value, new: &Value) {
        let _ = (name, old, new);
    }
}

/// Hooks that accept everything and observe nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl PropertyHooks for NoHooks {}

/// An ordered name → value map used to build a store's contents in one go.
pub type PropertyMap = BTreeMap<String, Value>;

/// A thread-safe container of named, dynamically-typed properties.
pub struct PropertyStore {
    values: Mutex<HashMap<String, Value>>,
    /// Emitted with `(name, new_value)` after a write changes a property.
    pub property_changed: Signal<(String, Value)>,
    /// Emitted after every change, following `property_changed`.
    pub data_changed: Signal<()>,
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            property_changed: Signal::new(),
            data_changed: Signal::new(),
        }
    }

    /// Get a property, or [`Value::Null`] if it does not exist.
    pub fn get(&self, name: &str) -> Value {
        self.values.lock().get(name).cloned().unwrap_or_default()
    }

    /// Access a property through a closure without cloning it.
    pub fn with<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce(Option<&Value>) -> R,
    {
        f(self.values.lock().get(name))
    }

    /// Set a property with no hooks.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> SetOutcome {
        self.set_with(name, value.into(), &NoHooks)
    }

    /// Set a property, consulting `hooks` before and after the write.
    ///
    /// Redundant writes are accepted without notifications, so setting the
    /// same value twice notifies exactly once.
    #[tracing::instrument(skip(self, value, hooks), target = "triad_core::property", level = "trace")]
    pub fn set_with<H>(&self, name: &str, value: Value, hooks: &H) -> SetOutcome
    where
        H: PropertyHooks + ?Sized,
    {
        let old = {
            let mut values = self.values.lock();

            if !hooks.before_set(name, &value) {
                tracing::debug!(
                    target: "triad_core::property",
                    property = name,
                    kind = value.kind(),
                    "write rejected by before_set hook"
                );
                return SetOutcome::Rejected;
            }

            let old = values.get(name).cloned().unwrap_or_default();
            if old == value {
                return SetOutcome::Unchanged;
            }

            if value.is_null() {
                values.remove(name);
            } else {
                values.insert(name.to_string(), value.clone());
            }
            old
        };

        hooks.after_set(name, &old, &value);

        tracing::trace!(target: "triad_core::property", property = name, "property changed");
        self.property_changed.emit((name.to_string(), value));
        self.data_changed.emit(());
        SetOutcome::Changed
    }

    /// Store a value with no hooks and no notifications.
    ///
    /// Reserved for populating defaults during initialization.
    pub fn set_silent(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut values = self.values.lock();
        if value.is_null() {
            values.remove(name);
        } else {
            values.insert(name.to_string(), value);
        }
    }

    /// Silently replace every property at once.
    ///
    /// Readers observe either the old contents or the new contents, never a
    /// mix of the two.
    pub fn replace_all(&self, properties: PropertyMap) {
        let fresh: HashMap<String, Value> = properties
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
        *self.values.lock() = fresh;
    }

    /// Whether a property exists.
    pub fn has(&self, name: &str) -> bool {
        self.values.lock().contains_key(name)
    }

    /// All property names.
    pub fn names(&self) -> BTreeSet<String> {
        self.values.lock().keys().cloned().collect()
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether the store holds no properties.
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Remove every property without notifications.
    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// A consistent copy of all properties.
    pub fn snapshot(&self) -> PropertyMap {
        self.values
            .lock()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyStore")
            .field("values", &self.snapshot())
            .finish()
    }
}

static_assertions::assert_impl_all!(PropertyStore: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ThemeHooks {
        after_calls: Mutex<Vec<(String, Value, Value)>>,
    }

    impl PropertyHooks for ThemeHooks {
        fn before_set(&self, name: &str, value: &Value) -> bool {
            name != "theme" || matches!(value.as_str(), Some("default" | "dark" | "light"))
        }

        fn after_set(&self, name: &str, old: &Value, new: &Value) {
            self.after_calls
                .lock()
                .push((name.to_string(), old.clone(), new.clone()));
        }
    }

    fn theme_hooks() -> ThemeHooks {
        ThemeHooks {
            after_calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_missing_property_is_null() {
        let store = PropertyStore::new();
        assert_eq!(store.get("nope"), Value::Null);
        assert!(!store.has("nope"));
    }

    #[test]
    fn test_set_twice_notifies_once() {
        let store = PropertyStore::new();
        let changes = Arc::new(AtomicUsize::new(0));

        let changes_clone = changes.clone();
        store.property_changed.connect(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.set("count", 1), SetOutcome::Changed);
        assert_eq!(store.set("count", 1), SetOutcome::Unchanged);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nan_twice_notifies_once() {
        let store = PropertyStore::new();
        let changes = Arc::new(AtomicUsize::new(0));

        let changes_clone = changes.clone();
        store.data_changed.connect(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.set("ratio", f64::NAN), SetOutcome::Changed);
        assert_eq!(store.set("ratio", f64::NAN), SetOutcome::Unchanged);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notification_order() {
        let store = Arc::new(PropertyStore::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        store.property_changed.connect(move |(name, value)| {
            log_clone.lock().push(format!("property:{name}={value}"));
        });
        let log_clone = log.clone();
        store.data_changed.connect(move |_| {
            log_clone.lock().push("data".to_string());
        });

        store.set("status", "Saving...");
        assert_eq!(*log.lock(), vec!["property:status=Saving...", "data"]);
    }

    #[test]
    fn test_rejected_write_leaves_store_untouched() {
        let store = PropertyStore::new();
        let hooks = theme_hooks();
        let changes = Arc::new(AtomicUsize::new(0));

        let changes_clone = changes.clone();
        store.data_changed.connect(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set_silent("theme", "default");
        let outcome = store.set_with("theme", Value::from("neon"), &hooks);

        assert_eq!(outcome, SetOutcome::Rejected);
        assert!(!outcome.is_accepted());
        assert_eq!(store.get("theme"), Value::from("default"));
        assert_eq!(changes.load(Ordering::SeqCst), 0);
        assert!(hooks.after_calls.lock().is_empty());
    }

    #[test]
    fn test_after_set_receives_old_and_new() {
        let store = PropertyStore::new();
        let hooks = theme_hooks();

        store.set_with("theme", Value::from("dark"), &hooks);
        store.set_with("theme", Value::from("light"), &hooks);

        let calls = hooks.after_calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("theme".into(), Value::Null, Value::from("dark")));
        assert_eq!(calls[1], ("theme".into(), Value::from("dark"), Value::from("light")));
    }

    #[test]
    fn test_after_set_may_reenter_store() {
        struct Mirror {
            store: std::sync::Weak<PropertyStore>,
        }

        impl PropertyHooks for Mirror {
            fn after_set(&self, name: &str, _old: &Value, new: &Value) {
                if name == "source" {
                    if let Some(store) = self.store.upgrade() {
                        store.set("mirror", new.clone());
                    }
                }
            }
        }

        let store = Arc::new(PropertyStore::new());
        let hooks = Mirror {
            store: Arc::downgrade(&store),
        };

        store.set_with("source", Value::from(5), &hooks);
        assert_eq!(store.get("mirror"), Value::from(5));
    }

    #[test]
    fn test_last_accepted_write_wins() {
        let store = PropertyStore::new();
        let hooks = theme_hooks();

        for theme in ["dark", "neon", "light", "bogus"] {
            store.set_with("theme", Value::from(theme), &hooks);
        }
        assert_eq!(store.get("theme"), Value::from("light"));
    }

    #[test]
    fn test_set_silent_does_not_notify() {
        let store = PropertyStore::new();
        let changes = Arc::new(AtomicUsize::new(0));

        let changes_clone = changes.clone();
        store.data_changed.connect(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set_silent("a", 1);
        store.replace_all(PropertyMap::from([("b".to_string(), Value::from(2))]));
        store.clear();
        assert_eq!(changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_names_and_snapshot() {
        let store = PropertyStore::new();
        store.set_silent("b", 2);
        store.set_silent("a", 1);

        let names: Vec<_> = store.names().into_iter().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.snapshot().get("a"), Some(&Value::from(1)));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_setting_null_removes_property() {
        let store = PropertyStore::new();
        store.set("temp", 1);
        assert_eq!(store.set("temp", Value::Null), SetOutcome::Changed);
        assert!(!store.has("temp"));
        assert_eq!(store.set("temp", Value::Null), SetOutcome::Unchanged);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(PropertyStore::new());
        let changes = Arc::new(AtomicUsize::new(0));

        let changes_clone = changes.clone();
        store.data_changed.connect(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.set(&format!("worker{t}"), i);
                        let _ = store.get("worker0");
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for t in 0..8 {
            assert_eq!(store.get(&format!("worker{t}")), Value::from(99));
        }
        // Every write changed its own key: 8 threads x 100 values.
        assert_eq!(changes.load(Ordering::SeqCst), 800);
    }
}
