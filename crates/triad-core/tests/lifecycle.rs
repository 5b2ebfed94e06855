//! End-to-end lifecycle tests: a themed model, a recording view and the
//! default controller wired together through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use triad_core::{
    Controller, ControllerHooks, DefaultHooks, Model, ModelError, ModelHooks, NOT_INITIALIZED,
    PropertyHooks, PropertyMap, PropertyStore, SetOutcome, Value, View, ViewBase,
};

const THEMES: [&str; 3] = ["default", "dark", "light"];

#[derive(Default)]
struct ThemedModel {
    populations: AtomicUsize,
}

impl PropertyHooks for ThemedModel {
    fn before_set(&self, name: &str, value: &Value) -> bool {
        name != "theme" || value.as_str().is_some_and(|theme| THEMES.contains(&theme))
    }
}

impl ModelHooks for ThemedModel {
    fn populate(&self, properties: &mut PropertyMap) -> Result<(), ModelError> {
        self.populations.fetch_add(1, Ordering::SeqCst);
        properties.insert("appName".into(), "Triad".into());
        properties.insert("statusMessage".into(), "Ready".into());
        properties.insert("theme".into(), "default".into());
        Ok(())
    }

    fn validate(&self, store: &PropertyStore) -> bool {
        store.with("appName", |name| name.and_then(Value::as_str).is_some_and(|n| !n.is_empty()))
    }
}

struct RecordingView {
    base: ViewBase,
    updates: AtomicUsize,
    errors: Mutex<Vec<String>>,
    infos: Mutex<Vec<String>>,
}

impl RecordingView {
    fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<RecordingView>| {
            let owner: Weak<dyn View> = weak.clone();
            RecordingView {
                base: ViewBase::new(owner),
                updates: AtomicUsize::new(0),
                errors: Mutex::new(Vec::new()),
                infos: Mutex::new(Vec::new()),
            }
        })
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn reset_updates(&self) {
        self.updates.store(0, Ordering::SeqCst);
    }
}

impl View for RecordingView {
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

    fn show_info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }
}

struct Fixture {
    hooks: Arc<ThemedModel>,
    model: Arc<Model>,
    view: Arc<RecordingView>,
    controller: Arc<Controller>,
}

fn fixture(hooks: impl ControllerHooks + 'static) -> Fixture {
    let model_hooks = Arc::new(ThemedModel::default());
    let model = Arc::new(Model::with_shared_hooks(model_hooks.clone()));
    model.initialize().unwrap();

    let view = RecordingView::new();
    view.initialize().unwrap();

    let controller = Controller::new(hooks);
    controller.set_model(Some(model.clone()));
    controller.set_view(Some(view.clone()));

    Fixture {
        hooks: model_hooks,
        model,
        view,
        controller,
    }
}

#[test]
fn test_status_message_change_updates_view_exactly_once() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    f.view.reset_updates();

    assert_eq!(f.model.set("statusMessage", "Saving..."), SetOutcome::Changed);

    assert_eq!(f.view.updates(), 1);
    assert_eq!(f.model.get("statusMessage"), Value::from("Saving..."));
}

#[test]
fn test_unchanged_value_does_not_update_view() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    f.model.set("statusMessage", "Saving...");
    f.view.reset_updates();

    assert_eq!(f.model.set("statusMessage", "Saving..."), SetOutcome::Unchanged);
    assert_eq!(f.view.updates(), 0);
}

#[test]
fn test_rejected_theme_leaves_model_and_view_untouched() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    f.view.reset_updates();

    assert_eq!(f.model.set("theme", "neon"), SetOutcome::Rejected);

    assert_eq!(f.model.get("theme"), Value::from("default"));
    assert_eq!(f.view.updates(), 0);

    assert!(f.model.set("theme", "dark").is_changed());
    assert_eq!(f.view.updates(), 1);
}

#[test]
fn test_initialize_is_idempotent_throughout() {
    let f = fixture(DefaultHooks);

    f.model.initialize().unwrap();
    assert_eq!(f.hooks.populations.load(Ordering::SeqCst), 1);

    assert!(!f.controller.is_valid());
    f.controller.initialize().unwrap();
    f.controller.initialize().unwrap();
    assert!(f.controller.is_valid());

    f.view.initialize().unwrap();
    assert!(f.view.is_view_valid());
}

#[test]
fn test_uninitialized_controller_reports_one_error() {
    let f = fixture(DefaultHooks);
    f.view.reset_updates();

    f.view.base().report_action("refresh", Value::Null);

    assert_eq!(*f.view.errors.lock(), vec![NOT_INITIALIZED]);
    assert!(f.view.infos.lock().is_empty());
    assert_eq!(f.view.updates(), 0);
}

#[test]
fn test_refresh_action_round_trip() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    f.view.reset_updates();

    f.view.base().report_action("refresh", Value::Null);

    assert_eq!(f.view.updates(), 1);
    assert_eq!(*f.view.infos.lock(), vec!["View updated"]);
    assert!(f.view.errors.lock().is_empty());
}

#[test]
fn test_unknown_action_is_ignored() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();

    f.view.base().report_action("print", "all pages");

    assert!(f.view.errors.lock().is_empty());
    assert!(f.view.infos.lock().is_empty());
}

#[test]
fn test_rebinding_model_isolates_old_model() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();

    let replacement = Arc::new(Model::new(ThemedModel::default()));
    replacement.initialize().unwrap();
    f.controller.set_model(Some(replacement.clone()));
    f.view.reset_updates();

    f.model.set("statusMessage", "old model");
    assert_eq!(f.view.updates(), 0);

    replacement.set("statusMessage", "new model");
    assert_eq!(f.view.updates(), 1);
}

#[test]
fn test_dropping_controller_releases_view_and_model() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    let Fixture {
        model,
        view,
        controller,
        ..
    } = f;

    drop(controller);

    assert!(view.controller().is_none());
    assert_eq!(Arc::strong_count(&model), 1);
    let before = view.updates();
    model.set("statusMessage", "nobody listens");
    assert_eq!(view.updates(), before);
}

#[test]
fn test_model_reset_notifies_view() {
    let f = fixture(DefaultHooks);
    f.controller.initialize().unwrap();
    f.model.set("statusMessage", "Working");
    f.view.reset_updates();

    f.model.reset().unwrap();

    assert_eq!(f.model.get("statusMessage"), Value::from("Ready"));
    assert!(f.view.updates() >= 1);
}
