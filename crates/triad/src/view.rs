//! A line-oriented text view.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use triad_core::{View, ViewBase, ViewError};

use crate::logging::APP_TARGET;
use crate::model::ApplicationModel;

/// Renders the [`ApplicationModel`] as text lines to a writer.
///
/// Every update prints the window title, the status line, the theme and the
/// busy flag. Errors are prefixed with `error:`, informational messages with
/// `info:`. Input is only accepted while the view is enabled; the
/// application controller disables it while an operation runs.
pub struct ConsoleView<W> {
    base: ViewBase,
    model: RwLock<Option<Arc<ApplicationModel>>>,
    out: Mutex<W>,
}

impl ConsoleView<io::Stdout> {
    /// A view that writes to standard output.
    pub fn stdout() -> Arc<Self> {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send + 'static> ConsoleView<W> {
    /// Create a view writing to `out`.
    pub fn new(out: W) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ConsoleView<W>>| {
            let owner: Weak<dyn View> = weak.clone();
            ConsoleView {
                base: ViewBase::new(owner),
                model: RwLock::new(None),
                out: Mutex::new(out),
            }
        })
    }

    /// The model this view renders.
    pub fn set_application_model(&self, model: Arc<ApplicationModel>) {
        *self.model.write() = Some(model);
    }

    /// Report a user action. Returns `false` and prints a notice if the
    /// view is disabled.
    pub fn trigger(&self, name: &str, payload: &str) -> bool {
        if !self.base.is_enabled() {
            self.write_line(format_args!("busy: '{name}' ignored"));
            return false;
        }
        let data = if payload.is_empty() {
            triad_core::Value::Null
        } else {
            payload.into()
        };
        self.base.report_action(name, data);
        true
    }

    /// Announce that the view is closing.
    pub fn close(&self) {
        self.base.notify_closing();
    }

    /// Run `f` with the writer.
    pub fn with_output<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.out.lock())
    }

    fn write_line(&self, line: fmt::Arguments<'_>) {
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(target: APP_TARGET, error = %err, "console write failed");
        }
    }

    fn render(&self, model: &ApplicationModel) {
        let busy = if model.is_busy() { " [busy]" } else { "" };
        self.write_line(format_args!(
            "== {} ==\nstatus: {}{busy}\ntheme: {}",
            model.window_title(),
            model.status_message(),
            model.theme(),
        ));
    }
}

impl<W: Write + Send + 'static> View for ConsoleView<W> {
    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn initialize(&self) -> Result<(), ViewError> {
        self.base.run_initialize(|| {
            if self.model.read().is_none() {
                return Err(ViewError::InitializationFailed("no application model".into()));
            }
            Ok(())
        })
    }

    fn update_view(&self) {
        if !self.base.is_initialized() {
            return;
        }
        let model = self.model.read().clone();
        if let Some(model) = model {
            self.render(&model);
            self.base.finish_update();
        }
    }

    fn show_error(&self, message: &str) {
        self.write_line(format_args!("error: {message}"));
    }

    fn show_info(&self, message: &str) {
        self.write_line(format_args!("info: {message}"));
    }
}

impl<W> fmt::Debug for ConsoleView<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleView")
            .field("base", &self.base)
            .field("has_model", &self.model.read().is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(ConsoleView<Vec<u8>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn view() -> (Arc<ConsoleView<Vec<u8>>>, Arc<ApplicationModel>) {
        let model = Arc::new(ApplicationModel::new(&AppConfig::default()));
        model.initialize().unwrap();
        let view = ConsoleView::new(Vec::new());
        view.set_application_model(model.clone());
        view.initialize().unwrap();
        (view, model)
    }

    fn output(view: &ConsoleView<Vec<u8>>) -> String {
        view.with_output(|out| String::from_utf8_lossy(out).into_owned())
    }

    #[test]
    fn test_initialize_requires_model() {
        let view = ConsoleView::new(Vec::new());
        assert!(view.initialize().is_err());
        assert!(!view.is_view_valid());
    }

    #[test]
    fn test_update_renders_model() {
        let (view, model) = view();
        model.set_busy(true);
        model.set_theme("dark");
        view.update_view();

        let text = output(&view);
        assert!(text.contains(&model.window_title()));
        assert!(text.contains("status: Ready [busy]"));
        assert!(text.contains("theme: dark"));
    }

    #[test]
    fn test_messages_are_prefixed() {
        let (view, _model) = view();
        view.show_error("disk full");
        view.show_info("Document saved successfully");

        assert_eq!(output(&view), "error: disk full\ninfo: Document saved successfully\n");
    }

    #[test]
    fn test_disabled_view_ignores_trigger() {
        let (view, _model) = view();
        let actions = Arc::new(Mutex::new(Vec::new()));
        let actions_clone = actions.clone();
        view.signals().user_action.connect(move |(name, data)| {
            actions_clone.lock().push((name.clone(), data.clone()));
        });

        assert!(view.trigger("test", "hello"));
        view.set_view_enabled(false);
        assert!(!view.trigger("save", ""));

        assert_eq!(
            *actions.lock(),
            vec![("test".to_string(), triad_core::Value::from("hello"))]
        );
        assert!(output(&view).contains("busy: 'save' ignored"));
    }
}
