//! The application model.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use triad_core::{Model, ModelError, ModelHooks, PropertyHooks, PropertyMap, PropertyStore, SetOutcome, Signal, Value};

use crate::config::AppConfig;
use crate::settings::Settings;

/// Property names of [`ApplicationModel`].
pub mod props {
    /// Short application name.
    pub const APP_NAME: &str = "appName";
    /// Application version.
    pub const APP_VERSION: &str = "appVersion";
    /// Human-readable title.
    pub const APP_TITLE: &str = "appTitle";
    /// Current status line.
    pub const STATUS_MESSAGE: &str = "statusMessage";
    /// Whether an operation is running.
    pub const IS_BUSY: &str = "isBusy";
    /// When the status last changed.
    pub const LAST_UPDATED: &str = "lastUpdated";
    /// Name of the current user.
    pub const USER_NAME: &str = "userName";
    /// Active theme.
    pub const THEME: &str = "theme";
}

/// Themes the application can display.
pub const VALID_THEMES: [&str; 3] = ["default", "dark", "light"];

/// Settings key of the persisted user name.
pub const USER_NAME_KEY: &str = "application/userName";

/// Settings key of the persisted theme.
pub const THEME_KEY: &str = "application/theme";

/// Whether `theme` is one of [`VALID_THEMES`].
pub fn is_valid_theme(theme: &str) -> bool {
    VALID_THEMES.contains(&theme)
}

struct ApplicationHooks {
    name: String,
    version: String,
    title: String,
    ready_message: String,
    status_changed: Signal<String>,
    busy_state_changed: Signal<bool>,
    theme_changed: Signal<String>,
}

impl PropertyHooks for ApplicationHooks {
    fn before_set(&self, name: &str, value: &Value) -> bool {
        if name == props::THEME {
            return value.as_str().is_some_and(is_valid_theme);
        }
        true
    }

    fn after_set(&self, name: &str, _old: &Value, new: &Value) {
        match name {
            props::STATUS_MESSAGE => self.status_changed.emit(new.to_string_lossy()),
            props::IS_BUSY => self.busy_state_changed.emit(new.as_bool().unwrap_or(false)),
            props::THEME => self.theme_changed.emit(new.to_string_lossy()),
            _ => {}
        }
    }
}

impl ModelHooks for ApplicationHooks {
    fn populate(&self, properties: &mut PropertyMap) -> Result<(), ModelError> {
        properties.insert(props::APP_NAME.into(), self.name.as_str().into());
        properties.insert(props::APP_VERSION.into(), self.version.as_str().into());
        properties.insert(props::APP_TITLE.into(), self.title.as_str().into());
        properties.insert(props::STATUS_MESSAGE.into(), self.ready_message.as_str().into());
        properties.insert(props::IS_BUSY.into(), false.into());
        properties.insert(props::LAST_UPDATED.into(), Utc::now().into());
        properties.insert(props::USER_NAME.into(), "".into());
        properties.insert(props::THEME.into(), "default".into());
        Ok(())
    }

    fn validate(&self, store: &PropertyStore) -> bool {
        let non_empty = |name: &str| store.with(name, |v| v.and_then(Value::as_str).is_some_and(|s| !s.is_empty()));
        let theme_ok = store.with(props::THEME, |v| v.and_then(Value::as_str).is_some_and(is_valid_theme));
        non_empty(props::APP_NAME) && non_empty(props::APP_VERSION) && theme_ok
    }
}

/// Application state: identity, status line, busy flag, user and theme.
///
/// Wraps a core [`Model`] with typed accessors. The theme only accepts the
/// values in [`VALID_THEMES`].
pub struct ApplicationModel {
    model: Arc<Model>,
    hooks: Arc<ApplicationHooks>,
    /// Emitted after [`load_settings`](Self::load_settings).
    pub settings_loaded: Signal<()>,
    /// Emitted after [`save_settings`](Self::save_settings).
    pub settings_saved: Signal<()>,
}

impl ApplicationModel {
    /// Create a model whose defaults come from `config`.
    pub fn new(config: &AppConfig) -> Self {
        let hooks = Arc::new(ApplicationHooks {
            name: config.application.name.clone(),
            version: config.application.version.clone(),
            title: config.application.title.clone(),
            ready_message: config.status.ready_message.clone(),
            status_changed: Signal::new(),
            busy_state_changed: Signal::new(),
            theme_changed: Signal::new(),
        });
        let model = Arc::new(Model::with_shared_hooks(hooks.clone()));
        Self {
            model,
            hooks,
            settings_loaded: Signal::new(),
            settings_saved: Signal::new(),
        }
    }

    /// The underlying core model, for binding to a controller.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Populate defaults. Idempotent.
    pub fn initialize(&self) -> Result<(), ModelError> {
        self.model.initialize()
    }

    /// Restore the defaults.
    pub fn reset(&self) -> Result<(), ModelError> {
        self.model.reset()
    }

    /// Whether the model is initialized and consistent.
    pub fn is_valid(&self) -> bool {
        self.model.is_valid()
    }

    /// Emitted with the new status line.
    pub fn status_changed(&self) -> &Signal<String> {
        &self.hooks.status_changed
    }

    /// Emitted with the new busy flag.
    pub fn busy_state_changed(&self) -> &Signal<bool> {
        &self.hooks.busy_state_changed
    }

    /// Emitted with the new theme.
    pub fn theme_changed(&self) -> &Signal<String> {
        &self.hooks.theme_changed
    }

    fn text(&self, name: &str) -> String {
        self.model.get(name).to_string_lossy()
    }

    pub fn app_name(&self) -> String {
        self.text(props::APP_NAME)
    }

    pub fn app_version(&self) -> String {
        self.text(props::APP_VERSION)
    }

    pub fn app_title(&self) -> String {
        self.text(props::APP_TITLE)
    }

    pub fn status_message(&self) -> String {
        self.text(props::STATUS_MESSAGE)
    }

    pub fn is_busy(&self) -> bool {
        self.model.get(props::IS_BUSY).as_bool().unwrap_or(false)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.model.get(props::LAST_UPDATED).as_timestamp()
    }

    pub fn user_name(&self) -> String {
        self.text(props::USER_NAME)
    }

    pub fn theme(&self) -> String {
        self.text(props::THEME)
    }

    /// `"<title> - v<version>"`.
    pub fn window_title(&self) -> String {
        format!("{} - v{}", self.app_title(), self.app_version())
    }

    pub fn set_app_name(&self, name: &str) -> SetOutcome {
        self.model.set(props::APP_NAME, name)
    }

    pub fn set_app_version(&self, version: &str) -> SetOutcome {
        self.model.set(props::APP_VERSION, version)
    }

    pub fn set_app_title(&self, title: &str) -> SetOutcome {
        self.model.set(props::APP_TITLE, title)
    }

    pub fn set_status_message(&self, message: &str) -> SetOutcome {
        self.model.set(props::STATUS_MESSAGE, message)
    }

    pub fn set_busy(&self, busy: bool) -> SetOutcome {
        self.model.set(props::IS_BUSY, busy)
    }

    pub fn set_last_updated(&self, at: DateTime<Utc>) -> SetOutcome {
        self.model.set(props::LAST_UPDATED, at)
    }

    pub fn set_user_name(&self, user: &str) -> SetOutcome {
        self.model.set(props::USER_NAME, user)
    }

    /// Switch theme. Anything outside [`VALID_THEMES`] is rejected.
    pub fn set_theme(&self, theme: &str) -> SetOutcome {
        self.model.set(props::THEME, theme)
    }

    /// Set the status line and stamp the update time.
    pub fn update_status(&self, message: &str) {
        self.set_status_message(message);
        self.set_last_updated(Utc::now());
    }

    /// Empty the status line.
    pub fn clear_status(&self) {
        self.set_status_message("");
    }

    /// Apply the persisted user name and theme from `settings`.
    ///
    /// A persisted theme that is no longer valid is ignored.
    pub fn load_settings(&self, settings: &Settings) {
        let user = settings.get_or(USER_NAME_KEY, "").to_string_lossy();
        self.set_user_name(&user);

        let theme = settings.get_or(THEME_KEY, "default").to_string_lossy();
        if self.set_theme(&theme) == SetOutcome::Rejected {
            tracing::warn!(target: "triad::app", %theme, "ignoring invalid persisted theme");
        }

        tracing::debug!(target: "triad::app", user = %user, theme = %self.theme(), "settings loaded");
        self.settings_loaded.emit(());
    }

    /// Persist the user name and theme into `settings`.
    pub fn save_settings(&self, settings: &Settings) {
        settings.set(USER_NAME_KEY, self.user_name());
        settings.set(THEME_KEY, self.theme());
        self.settings_saved.emit(());
    }
}

impl fmt::Debug for ApplicationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationModel")
            .field("model", &self.model)
            .finish()
    }
}

static_assertions::assert_impl_all!(ApplicationModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn model() -> ApplicationModel {
        let model = ApplicationModel::new(&AppConfig::default());
        model.initialize().unwrap();
        model
    }

    #[test]
    fn test_defaults() {
        let model = model();
        assert_eq!(model.app_name(), "Triad");
        assert_eq!(model.app_title(), "Triad Simple Template");
        assert_eq!(model.status_message(), "Ready");
        assert_eq!(model.theme(), "default");
        assert!(!model.is_busy());
        assert!(model.last_updated().is_some());
        assert!(model.is_valid());
    }

    #[test]
    fn test_invalid_theme_rejected() {
        let model = model();
        assert_eq!(model.set_theme("neon"), SetOutcome::Rejected);
        assert_eq!(model.theme(), "default");
        assert_eq!(model.set_theme("dark"), SetOutcome::Changed);
        assert_eq!(model.theme(), "dark");
    }

    #[test]
    fn test_specific_signals_fire() {
        let model = model();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        model.status_changed().connect(move |s| l.lock().push(format!("status:{s}")));
        let l = log.clone();
        model.busy_state_changed().connect(move |b| l.lock().push(format!("busy:{b}")));
        let l = log.clone();
        model.theme_changed().connect(move |t| l.lock().push(format!("theme:{t}")));

        model.set_status_message("Saving...");
        model.set_busy(true);
        model.set_theme("light");
        model.set_theme("neon");
        model.set_busy(true);

        assert_eq!(
            *log.lock(),
            vec!["status:Saving...", "busy:true", "theme:light"]
        );
    }

    #[test]
    fn test_empty_version_is_invalid() {
        let model = model();
        model.set_app_version("");
        assert!(!model.is_valid());
    }

    #[test]
    fn test_update_status_stamps_time() {
        let model = model();
        let before = model.last_updated().unwrap();
        model.update_status("Document saved");
        assert_eq!(model.status_message(), "Document saved");
        assert!(model.last_updated().unwrap() >= before);

        model.clear_status();
        assert_eq!(model.status_message(), "");
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = Settings::new();
        let model = model();
        model.set_user_name("ada");
        model.set_theme("dark");
        model.save_settings(&settings);

        let other = self::model();
        other.load_settings(&settings);
        assert_eq!(other.user_name(), "ada");
        assert_eq!(other.theme(), "dark");
    }

    #[test]
    fn test_invalid_persisted_theme_is_ignored() {
        let settings = Settings::new();
        settings.set(THEME_KEY, "neon");

        let model = model();
        model.load_settings(&settings);
        assert_eq!(model.theme(), "default");
    }

    #[test]
    fn test_window_title() {
        let model = model();
        model.set_app_version("1.2.0");
        assert_eq!(model.window_title(), "Triad Simple Template - v1.2.0");
    }
}
