//! Persistent key-value settings.
//!
//! Keys are paths whose segments may be separated by either `.` or `/`; both
//! spellings address the same entry and are stored in the `/` form:
//!
//! ```
//! use triad::Settings;
//!
//! let settings = Settings::new();
//! settings.set("window.width", 1000);
//! assert_eq!(settings.get("window/width").and_then(|v| v.as_integer()), Some(1000));
//! ```
//!
//! On disk, settings are a nested document whose tables are the key groups:
//! `application/theme` becomes `theme` inside an `[application]` table in
//! TOML, or inside an `"application"` object in JSON. The format is chosen by
//! the file extension, and saves go through a temporary file in the target
//! directory so that a crash never leaves a half-written file behind.
//!
//! Strings always load back as strings, including ones that look like dates.
//! Timestamps are stored as RFC 3339 text and also load back as strings; read
//! them with [`Value::as_timestamp`].

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use parking_lot::RwLock;
use triad_core::{Signal, Value};

use crate::error::SettingsError;

/// On-disk encoding of a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
}

impl SettingsFormat {
    /// Pick the format from `path`'s extension.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => Err(SettingsError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Normalize a key path to its `/`-separated form.
///
/// Empty segments are dropped, so `".a..b/"` becomes `"a/b"`.
pub fn normalize_key(key: &str) -> String {
    key.split(['.', '/'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A thread-safe store of settings values.
pub struct Settings {
    data: RwLock<BTreeMap<String, Value>>,
    changed: Signal<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            changed: Signal::new(),
        }
    }

    /// Read a settings file into a new store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings = Self::new();
        *settings.data.write() = read_file(path.as_ref())?;
        Ok(settings)
    }

    /// Emitted with the normalized key whenever an entry changes.
    ///
    /// [`clear`](Self::clear) emits an empty key.
    pub fn changed(&self) -> &Signal<String> {
        &self.changed
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(&normalize_key(key)).cloned()
    }

    /// The value stored under `key`, or `default` if there is none.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Store `value` under `key`.
    ///
    /// Storing [`Value::Null`] removes the entry. Returns whether the stored
    /// value changed; `changed` is emitted only if it did.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let key = normalize_key(key);
        if key.is_empty() {
            return false;
        }
        let value = value.into();

        let changed = {
            let mut data = self.data.write();
            if value.is_null() {
                data.remove(&key).is_some()
            } else if data.get(&key) == Some(&value) {
                false
            } else {
                data.insert(key.clone(), value);
                true
            }
        };

        if changed {
            self.changed.emit(key);
        }
        changed
    }

    /// Store every entry of `values`, emitting `changed` per modified key.
    pub fn extend(&self, values: BTreeMap<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    /// Whether an entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.data.read().contains_key(&normalize_key(key))
    }

    /// Remove the entry under `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let key = normalize_key(key);
        let removed = self.data.write().remove(&key);
        if removed.is_some() {
            self.changed.emit(key);
        }
        removed
    }

    /// Every key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Keys directly or indirectly under `group`, sorted.
    pub fn group_keys(&self, group: &str) -> Vec<String> {
        let prefix = format!("{}/", normalize_key(group));
        self.data
            .read()
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let was_empty = {
            let mut data = self.data.write();
            let was_empty = data.is_empty();
            data.clear();
            was_empty
        };
        if !was_empty {
            self.changed.emit(String::new());
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// A copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.data.read().clone()
    }

    /// Write every entry to `path` in the format its extension names.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let format = SettingsFormat::from_path(path)?;
        let tree = nest(&self.data.read());

        let encoded = match format {
            SettingsFormat::Toml => {
                toml::to_string_pretty(&tree).map_err(|err| SettingsError::serialize(path, err))?
            }
            SettingsFormat::Json => {
                serde_json::to_string_pretty(&tree).map_err(|err| SettingsError::serialize(path, err))?
            }
        };

        atomic_write(path, encoded.as_bytes())?;
        tracing::debug!(target: "triad::settings", path = %path.display(), entries = self.len(), "settings saved");
        Ok(())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("entries", &self.len())
            .finish()
    }
}

/// Read and flatten the settings file at `path`.
pub fn read_file(path: &Path) -> Result<BTreeMap<String, Value>, SettingsError> {
    let format = SettingsFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|err| SettingsError::io(path, err))?;

    let tree: BTreeMap<String, Value> = match format {
        SettingsFormat::Toml => toml::from_str(&content).map_err(|err| SettingsError::parse(path, err))?,
        SettingsFormat::Json => {
            serde_json::from_str(&content).map_err(|err| SettingsError::parse(path, err))?
        }
    };

    let mut flat = BTreeMap::new();
    flatten("", tree, &mut flat);
    tracing::debug!(target: "triad::settings", path = %path.display(), entries = flat.len(), "settings loaded");
    Ok(flat)
}

fn flatten(prefix: &str, tree: BTreeMap<String, Value>, out: &mut BTreeMap<String, Value>) {
    for (name, value) in tree {
        let key = if prefix.is_empty() {
            normalize_key(&name)
        } else {
            format!("{prefix}/{}", normalize_key(&name))
        };
        match value {
            Value::Map(group) => flatten(&key, group, out),
            Value::Null => {}
            leaf => {
                out.insert(key, leaf);
            }
        }
    }
}

/// Build the nested document for `flat`. A group shadows a leaf of the same
/// name.
fn nest(flat: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut root = BTreeMap::new();
    for (key, value) in flat {
        let segments: Vec<&str> = key.split('/').collect();
        insert_nested(&mut root, &segments, value.clone());
    }
    root
}

fn insert_nested(node: &mut BTreeMap<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        node.entry(first.to_string()).or_insert(value);
        return;
    }

    let entry = node
        .entry(first.to_string())
        .or_insert_with(|| Value::Map(BTreeMap::new()));
    if !matches!(entry, Value::Map(_)) {
        *entry = Value::Map(BTreeMap::new());
    }
    if let Value::Map(group) = entry {
        insert_nested(group, rest, value);
    }
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| SettingsError::io(path, err))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|err| SettingsError::io(path, err))?;
    temp.write_all(contents).map_err(|err| SettingsError::io(path, err))?;
    temp.as_file().sync_all().map_err(|err| SettingsError::io(path, err))?;
    temp.persist(path).map_err(|err| SettingsError::io(path, err.error))?;
    Ok(())
}

static_assertions::assert_impl_all!(Settings: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_key_normalization() {
        assert_eq!(normalize_key("application.theme"), "application/theme");
        assert_eq!(normalize_key("/window//width."), "window/width");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_set_get_remove() {
        let settings = Settings::new();
        assert!(settings.set("application.theme", "dark"));
        assert!(!settings.set("application/theme", "dark"));

        assert_eq!(settings.get("application/theme"), Some(Value::from("dark")));
        assert!(settings.contains("application.theme"));
        assert_eq!(settings.get_or("window/width", 1000), Value::from(1000));

        assert_eq!(settings.remove("application/theme"), Some(Value::from("dark")));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_setting_null_removes() {
        let settings = Settings::new();
        settings.set("a", 1);
        assert!(settings.set("a", Value::Null));
        assert!(!settings.contains("a"));
    }

    #[test]
    fn test_changed_signal_reports_normalized_keys() {
        let settings = Settings::new();
        let keys = Arc::new(Mutex::new(Vec::new()));

        let keys_clone = keys.clone();
        settings.changed().connect(move |key| keys_clone.lock().push(key.clone()));

        settings.set("window.width", 800);
        settings.set("window.width", 800);
        settings.remove("window/width");
        settings.remove("window/width");

        assert_eq!(*keys.lock(), vec!["window/width", "window/width"]);
    }

    #[test]
    fn test_group_keys() {
        let settings = Settings::new();
        settings.set("window/width", 1);
        settings.set("window/height", 2);
        settings.set("windowed", true);

        assert_eq!(settings.group_keys("window"), vec!["window/height", "window/width"]);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SettingsFormat::from_path(Path::new("a.toml")).unwrap(), SettingsFormat::Toml);
        assert_eq!(SettingsFormat::from_path(Path::new("a.JSON")).unwrap(), SettingsFormat::Json);
        assert!(SettingsFormat::from_path(Path::new("a.ini")).is_err());
    }

    #[test]
    fn test_nest_and_flatten_agree() {
        let mut flat = BTreeMap::new();
        flat.insert("application/theme".to_string(), Value::from("dark"));
        flat.insert("window/width".to_string(), Value::from(1000));
        flat.insert("version".to_string(), Value::from(2));

        let mut back = BTreeMap::new();
        flatten("", nest(&flat), &mut back);
        assert_eq!(back, flat);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = Settings::new();
        settings.set("application/theme", "light");
        settings.set("window/maximized", false);
        settings.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[application]"));

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), settings.snapshot());
    }

    #[test]
    fn test_date_like_strings_load_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let stamp = chrono::Utc::now();

        let settings = Settings::new();
        settings.set("application/userName", "2024-05-01T12:00:00Z");
        settings.set("application/lastUpdated", stamp);
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(
            loaded.get("application/userName"),
            Some(Value::from("2024-05-01T12:00:00Z"))
        );
        let last = loaded.get("application/lastUpdated").unwrap();
        assert_eq!(last.as_timestamp(), Some(stamp));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }
}
