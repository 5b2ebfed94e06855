//! Log targets and debugging helpers.
//!
//! The runtime reports through `tracing` and never installs a subscriber;
//! the application does that once at startup (see `triad::logging::init`).
//! Events carry the subsystem targets in [`targets`], so a filter such as
//! `triad_core::controller=debug` follows a single subsystem.
//!
//! # Property Dumps
//!
//! Use [`PropertyDump`] to print the current state of a model:
//!
//! ```
//! use triad_core::{Model, NoHooks};
//! use triad_core::logging::PropertyDump;
//!
//! let model = Model::new(NoHooks);
//! model.set("statusMessage", "Ready");
//! println!("{}", PropertyDump::new().format(model.store()));
//! ```

use std::fmt::Write as _;

use crate::property::PropertyStore;

/// `tracing` targets of the runtime, one per subsystem.
pub mod targets {
    /// Core runtime target.
    pub const CORE: &str = "triad_core";
    /// Property store target.
    pub const PROPERTY: &str = "triad_core::property";
    /// Model lifecycle target.
    pub const MODEL: &str = "triad_core::model";
    /// Controller lifecycle target.
    pub const CONTROLLER: &str = "triad_core::controller";
    /// View contract target.
    pub const VIEW: &str = "triad_core::view";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "triad_core::signal";
    /// Dispatcher target.
    pub const DISPATCH: &str = "triad_core::dispatch";
}

/// Formatting options for [`PropertyDump`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Whether to show the value kind next to each value.
    pub show_kinds: bool,
    /// Longest value rendered before it is truncated with `...`.
    pub max_value_len: Option<usize>,
    /// Indent in front of each property line.
    pub indent: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            show_kinds: true,
            max_value_len: Some(60),
            indent: 2,
        }
    }
}

impl DumpOptions {
    /// Names and values only.
    pub fn minimal() -> Self {
        Self {
            show_kinds: false,
            max_value_len: None,
            indent: 0,
        }
    }
}

/// Debug utility that renders a property store as text, one property per
/// line in name order.
#[derive(Debug, Clone, Default)]
pub struct PropertyDump {
    options: DumpOptions,
}

impl PropertyDump {
    /// Create a dump with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dump with custom options.
    pub fn with_options(options: DumpOptions) -> Self {
        Self { options }
    }

    /// Render every property of `store`.
    pub fn format(&self, store: &PropertyStore) -> String {
        let snapshot = store.snapshot();
        let mut output = String::new();
        let _ = writeln!(output, "Properties ({} total):", snapshot.len());

        if snapshot.is_empty() {
            let _ = writeln!(output, "{:indent$}(empty)", "", indent = self.options.indent);
            return output;
        }

        for (name, value) in &snapshot {
            let mut rendered = value.to_string_lossy();
            if let Some(max) = self.options.max_value_len {
                if rendered.chars().count() > max {
                    rendered = rendered.chars().take(max).collect::<String>() + "...";
                }
            }
            let _ = write!(output, "{:indent$}{name} = {rendered}", "", indent = self.options.indent);
            if self.options.show_kinds {
                let _ = write!(output, " ({})", value.kind());
            }
            output.push('\n');
        }
        output
    }
}

/// Keeps an `info`-level `perf` span entered for its lifetime, so a
/// subscriber with span timing reports how long the guarded block took.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a span tagged with `operation = name`.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "triad::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

/// `tracing::trace!` with the `triad_core` target.
#[macro_export]
macro_rules! triad_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "triad_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! triad_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "triad_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! triad_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "triad_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! triad_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "triad_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! triad_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "triad_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_empty() {
        let store = PropertyStore::new();
        let output = PropertyDump::new().format(&store);
        assert!(output.contains("Properties (0 total)"));
        assert!(output.contains("(empty)"));
    }

    #[test]
    fn test_dump_lists_properties_in_name_order() {
        let store = PropertyStore::new();
        store.set("theme", "dark");
        store.set("isBusy", false);

        let output = PropertyDump::new().format(&store);
        let busy = output.find("isBusy").unwrap();
        let theme = output.find("theme").unwrap();
        assert!(busy < theme);
        assert!(output.contains("theme = dark (string)"));
    }

    #[test]
    fn test_dump_minimal_and_truncation() {
        let store = PropertyStore::new();
        store.set("statusMessage", "x".repeat(100));

        let output = PropertyDump::with_options(DumpOptions::minimal()).format(&store);
        assert!(output.contains(&"x".repeat(100)));
        assert!(!output.contains("(string)"));

        let output = PropertyDump::new().format(&store);
        assert!(output.contains("..."));
    }

    #[test]
    fn test_perf_span_guard() {
        let _span = PerfSpan::new("reload_model");
        triad_debug!("inside perf span");
    }
}
