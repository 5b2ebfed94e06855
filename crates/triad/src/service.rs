//! The configuration service.
//!
//! [`ConfigurationService`] owns the application's [`Settings`], seeds them
//! with defaults, and persists them to a file across start/stop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use triad_core::{Signal, Value};

use crate::error::SettingsError;
use crate::settings::{self, Settings, normalize_key};

/// Settings every installation starts with.
pub const DEFAULT_CONFIGURATION: [(&str, DefaultValue); 5] = [
    ("application/theme", DefaultValue::Text("default")),
    ("application/language", DefaultValue::Text("en")),
    ("window/width", DefaultValue::Integer(1000)),
    ("window/height", DefaultValue::Integer(700)),
    ("window/maximized", DefaultValue::Flag(false)),
];

/// A compile-time default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// A string default.
    Text(&'static str),
    /// An integer default.
    Integer(i64),
    /// A boolean default.
    Flag(bool),
}

impl From<DefaultValue> for Value {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Text(s) => Value::from(s),
            DefaultValue::Integer(n) => Value::from(n),
            DefaultValue::Flag(b) => Value::from(b),
        }
    }
}

/// Settings with defaults, a backing file, and lifecycle notifications.
pub struct ConfigurationService {
    settings: Settings,
    file: RwLock<Option<PathBuf>>,
    running: AtomicBool,
    /// Emitted with `(key, value)` on every write; `value` is `Null` for removals.
    pub configuration_changed: Signal<(String, Value)>,
    /// Emitted after the backing file was read.
    pub configuration_loaded: Signal<()>,
    /// Emitted after the backing file was written.
    pub configuration_saved: Signal<()>,
    /// Emitted after [`reset_to_defaults`](Self::reset_to_defaults).
    pub configuration_reset: Signal<()>,
    /// Emitted when [`start`](Self::start) succeeds.
    pub service_started: Signal<()>,
    /// Emitted when [`stop`](Self::stop) runs.
    pub service_stopped: Signal<()>,
    /// Emitted with a message when loading or saving fails.
    pub service_error: Signal<String>,
}

impl Default for ConfigurationService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationService {
    /// Create a service with no backing file.
    pub fn new() -> Self {
        Self {
            settings: Settings::new(),
            file: RwLock::new(None),
            running: AtomicBool::new(false),
            configuration_changed: Signal::new(),
            configuration_loaded: Signal::new(),
            configuration_saved: Signal::new(),
            configuration_reset: Signal::new(),
            service_started: Signal::new(),
            service_stopped: Signal::new(),
            service_error: Signal::new(),
        }
    }

    /// Create a service backed by `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let service = Self::new();
        *service.file.write() = Some(path.into());
        service
    }

    /// Human-readable service name.
    pub fn service_name(&self) -> &'static str {
        "Configuration Service"
    }

    /// Seed missing defaults.
    pub fn initialize(&self) {
        self.initialize_defaults();
    }

    /// Load the backing file and mark the service running. Idempotent.
    pub fn start(&self) -> Result<(), SettingsError> {
        if self.is_running() {
            return Ok(());
        }
        if let Err(err) = self.load_configuration() {
            self.service_error.emit("Failed to load configuration".to_string());
            return Err(err);
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(target: "triad::service", service = self.service_name(), "service started");
        self.service_started.emit(());
        Ok(())
    }

    /// Save to the backing file and mark the service stopped.
    ///
    /// The service stops even if saving fails; the error is returned.
    pub fn stop(&self) -> Result<(), SettingsError> {
        if !self.is_running() {
            return Ok(());
        }
        let saved = self.save_configuration();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(target: "triad::service", service = self.service_name(), "service stopped");
        self.service_stopped.emit(());
        saved
    }

    /// Whether [`start`](Self::start) has succeeded and [`stop`](Self::stop)
    /// has not run since.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The value stored under `key`, or `Null`.
    pub fn get_configuration(&self, key: &str) -> Value {
        self.settings.get(key).unwrap_or_default()
    }

    /// The value stored under `key`, or `default`.
    pub fn get_configuration_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.settings.get_or(key, default)
    }

    /// Store `value` under `key` and notify.
    pub fn set_configuration(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.settings.set(key, value.clone());
        self.configuration_changed.emit((normalize_key(key), value));
    }

    /// Whether `key` has a value.
    pub fn has_configuration(&self, key: &str) -> bool {
        self.settings.contains(key)
    }

    /// Remove `key` and notify with a `Null` value.
    pub fn remove_configuration(&self, key: &str) {
        self.settings.remove(key);
        self.configuration_changed.emit((normalize_key(key), Value::Null));
    }

    /// Every key, sorted.
    pub fn all_keys(&self) -> Vec<String> {
        self.settings.keys()
    }

    /// Remove every key and notify with an empty key.
    pub fn clear_configuration(&self) {
        self.settings.clear();
        self.configuration_changed.emit((String::new(), Value::Null));
    }

    /// Clear everything, re-seed the defaults, and notify.
    pub fn reset_to_defaults(&self) {
        self.clear_configuration();
        self.initialize_defaults();
        self.configuration_reset.emit(());
    }

    /// Write the settings to the backing file, if there is one.
    pub fn save_configuration(&self) -> Result<(), SettingsError> {
        let Some(path) = self.configuration_file() else {
            return Ok(());
        };
        if let Err(err) = self.settings.save(&path) {
            tracing::warn!(target: "triad::service", error = %err, "saving configuration failed");
            self.service_error.emit(err.to_string());
            return Err(err);
        }
        self.configuration_saved.emit(());
        Ok(())
    }

    /// Merge the backing file into the settings, if it exists.
    ///
    /// Values from the file override the current ones.
    pub fn load_configuration(&self) -> Result<(), SettingsError> {
        if let Some(path) = self.configuration_file().filter(|path| path.exists()) {
            let values = settings::read_file(&path)?;
            self.settings.extend(values);
        }
        self.configuration_loaded.emit(());
        Ok(())
    }

    /// The backing file.
    pub fn configuration_file(&self) -> Option<PathBuf> {
        self.file.read().clone()
    }

    /// Change the backing file. Setting the current file does nothing.
    pub fn set_configuration_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut file = self.file.write();
        if file.as_deref() == Some(path) {
            return;
        }
        *file = Some(path.to_path_buf());
    }

    /// The underlying settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn initialize_defaults(&self) {
        for (key, value) in DEFAULT_CONFIGURATION {
            if !self.has_configuration(key) {
                self.set_configuration(key, value);
            }
        }
    }
}

impl std::fmt::Debug for ConfigurationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationService")
            .field("file", &self.configuration_file())
            .field("running", &self.is_running())
            .field("entries", &self.settings.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ConfigurationService: Send, Sync);
