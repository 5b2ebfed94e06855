//! The application controller.
//!
//! [`ApplicationController`] wires an [`ApplicationModel`] and a view to a
//! core [`Controller`], runs the document actions on a background
//! [`Worker`], and keeps the status line fresh with a [`Ticker`].

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;
use parking_lot::{Mutex, RwLock};
use triad_core::{
    Bindings, ConnectionType, Controller, ControllerError, ControllerHooks, Dispatcher, PerfSpan, PropertyDump,
    SetOutcome, Subscription, Value, View,
};

use crate::config::{AppConfig, StatusSection, WorkSection};
use crate::error::AppResult;
use crate::logging::APP_TARGET;
use crate::model::ApplicationModel;
use crate::service::ConfigurationService;
use crate::worker::{Ticker, Worker};

/// Emitted when initialization starts without a model or view.
pub const MISSING_PARTS: &str = "Application model or main window not set";

/// Emitted when an action arrives while another one is still running.
pub const OPERATION_IN_PROGRESS: &str = "Another operation is in progress";

/// Final status of the `test` action when no payload is given.
pub const DEFAULT_TEST_MESSAGE: &str = "Test action performed";

/// A simulated document operation.
struct Operation {
    started: &'static str,
    duration: Duration,
    finished: String,
    completed: String,
}

impl Operation {
    fn new(started: &'static str, duration_ms: u64, finished: &str, completed: &str) -> Self {
        Self {
            started,
            duration: Duration::from_millis(duration_ms),
            finished: finished.to_string(),
            completed: completed.to_string(),
        }
    }
}

struct AppHooks {
    model: Arc<ApplicationModel>,
    service: Arc<ConfigurationService>,
    work: WorkSection,
    status: StatusSection,
    worker: Worker,
    ticker: Mutex<Option<Ticker>>,
    started: AtomicBool,
    in_flight: Arc<AtomicBool>,
    window_title: RwLock<String>,
}

impl AppHooks {
    fn run(&self, controller: &Controller, operation: Operation) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            controller.emit_error(OPERATION_IN_PROGRESS);
            return;
        }

        let Operation {
            started,
            duration,
            finished,
            completed,
        } = operation;
        tracing::debug!(target: APP_TARGET, operation = started, ?duration, "operation queued");
        self.model.update_status(started);

        let model = self.model.clone();
        let in_flight = self.in_flight.clone();
        let this = controller.downgrade();
        let queued = self.worker.send_with_callback(
            move || {
                model.set_busy(true);
                thread::sleep(duration);
                model.set_busy(false);
                model.update_status(&finished);
                completed
            },
            move |completed| {
                in_flight.store(false, Ordering::Release);
                if let Some(controller) = this.upgrade() {
                    controller.emit_operation_completed(completed);
                }
            },
        );

        if !queued {
            self.in_flight.store(false, Ordering::Release);
            controller.emit_error("Worker is not running");
        }
    }

    fn change_theme(&self, controller: &Controller, data: &Value) {
        let theme = data.to_string_lossy();
        if self.model.set_theme(&theme) == SetOutcome::Rejected {
            controller.emit_error(format!("Invalid theme: {theme}"));
        }
    }

    fn initialize_application(&self, controller: &Controller) -> AppResult<()> {
        let _perf = PerfSpan::new("initialize_application");
        let Some(view) = controller.view().filter(|_| controller.model().is_some()) else {
            controller.emit_error(MISSING_PARTS);
            let err = if controller.model().is_none() {
                ControllerError::NoModel
            } else {
                ControllerError::NoView
            };
            return Err(err.into());
        };

        if let Err(err) = self.model.initialize() {
            controller.emit_error("Failed to initialize application model");
            return Err(err.into());
        }
        if let Err(err) = view.initialize() {
            controller.emit_error("Failed to initialize main window");
            return Err(err.into());
        }
        if let Err(err) = controller.initialize() {
            controller.emit_error("Failed to initialize application controller");
            return Err(err.into());
        }

        self.load_application_settings();
        tracing::info!(target: APP_TARGET, title = %self.model.window_title(), "application initialized");
        if tracing::enabled!(target: APP_TARGET, tracing::Level::TRACE) {
            let dump = PropertyDump::new().format(self.model.model().store());
            tracing::trace!(target: APP_TARGET, "initial model state\n{dump}");
        }
        Ok(())
    }

    fn load_application_settings(&self) {
        self.model.load_settings(self.service.settings());
        self.model.update_status("Settings loaded");
    }

    fn save_application_settings(&self) {
        self.model.save_settings(self.service.settings());
        self.model.update_status("Settings saved");
    }

    fn start_application(&self, controller: &Controller) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.model.update_status("Starting application...");
        self.start_ticker();
        self.model.update_status("Application started");
        tracing::info!(target: APP_TARGET, "application started");
        controller.emit_operation_completed("Application started successfully");
    }

    fn stop_application(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        self.model.update_status("Stopping application...");
        self.stop_ticker();
        self.save_application_settings();
        self.model.update_status("Application stopped");
        tracing::info!(target: APP_TARGET, "application stopped");
    }

    fn start_ticker(&self) {
        let Some(interval) = self.status.tick_interval() else {
            return;
        };
        let model = Arc::downgrade(&self.model);
        let ready = self.status.ready_message.clone();
        let ticker = Ticker::start("triad-status", interval, move || {
            let Some(model) = model.upgrade() else {
                return;
            };
            if !model.is_busy() {
                model.update_status(&ready_status(&ready));
            }
        });
        match ticker {
            Ok(ticker) => *self.ticker.lock() = Some(ticker),
            Err(err) => tracing::warn!(target: APP_TARGET, error = %err, "status ticker not started"),
        }
    }

    fn stop_ticker(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }
    }
}

impl ControllerHooks for AppHooks {
    fn connect_model_and_view(&self, controller: &Controller, bindings: &mut Bindings) {
        let Some(view) = controller.view() else {
            return;
        };
        view.set_view_enabled(!self.model.is_busy());

        let view = Arc::downgrade(&view);
        let on_busy = move |busy: &bool| {
            if let Some(view) = view.upgrade() {
                view.set_view_enabled(!*busy);
            }
        };
        // The worker flips `isBusy`; the view only changes on the dispatcher's thread.
        let id = match controller.dispatcher() {
            Some(dispatcher) => self
                .model
                .busy_state_changed()
                .connect_queued(dispatcher, ConnectionType::Auto, on_busy),
            None => self.model.busy_state_changed().connect(on_busy),
        };
        bindings.push(Subscription::new(&self.model, move |m: &ApplicationModel| {
            m.busy_state_changed().disconnect(id);
        }));
    }

    fn handle_action(&self, controller: &Controller, name: &str, data: &Value) -> bool {
        let operation = match name {
            "new" => Operation::new(
                "Creating new document...",
                self.work.new_ms,
                "New document created",
                "New document created successfully",
            ),
            "open" => Operation::new(
                "Opening document...",
                self.work.open_ms,
                "Document opened",
                "Document opened successfully",
            ),
            "save" => Operation::new(
                "Saving document...",
                self.work.save_ms,
                "Document saved",
                "Document saved successfully",
            ),
            "test" => {
                let message = data.as_str().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_TEST_MESSAGE);
                Operation::new("Performing test action...", self.work.test_ms, message, message)
            }
            "long" => Operation::new(
                "Performing long operation...",
                self.work.long_ms,
                "Long operation completed",
                "Long operation completed",
            ),
            "theme" => {
                self.change_theme(controller, data);
                return true;
            }
            _ => return false,
        };
        self.run(controller, operation);
        true
    }

    fn validate_controller(&self, controller: &Controller) -> bool {
        controller.model().is_some() && controller.view().is_some() && self.model.is_valid()
    }

    fn update_controller_state(&self, _controller: &Controller) {
        let title = self.model.window_title();
        let mut current = self.window_title.write();
        if *current != title {
            tracing::trace!(target: APP_TARGET, %title, "window title changed");
            *current = title;
        }
    }

    fn on_view_closing(&self, _controller: &Controller) {
        self.stop_application();
    }
}

fn ready_status(ready: &str) -> String {
    format!("{ready} - {}", Local::now().format("%H:%M:%S"))
}

/// Coordinates the [`ApplicationModel`] with the main view.
///
/// Document actions (`new`, `open`, `save`, `test`, `long`) run one at a
/// time on a background worker. While one runs the model is busy and the
/// view is disabled; its completion is reported through
/// [`Controller::operation_completed`] on the dispatcher's thread.
pub struct ApplicationController {
    controller: Arc<Controller>,
    hooks: Arc<AppHooks>,
    _theme_status: Subscription,
}

impl ApplicationController {
    /// Create a controller for `model`, persisting through `service`.
    ///
    /// With a dispatcher, model changes made by the worker and the status
    /// ticker reach the view on the dispatcher's owner thread.
    pub fn new(
        config: &AppConfig,
        model: Arc<ApplicationModel>,
        service: Arc<ConfigurationService>,
        dispatcher: Option<Dispatcher>,
    ) -> io::Result<Self> {
        let worker = Worker::new("triad-worker", dispatcher.clone())?;
        let hooks = Arc::new(AppHooks {
            model: model.clone(),
            service,
            work: config.work.clone(),
            status: config.status.clone(),
            worker,
            ticker: Mutex::new(None),
            started: AtomicBool::new(false),
            in_flight: Arc::new(AtomicBool::new(false)),
            window_title: RwLock::new(model.window_title()),
        });

        let controller = Controller::with_shared_hooks(hooks.clone(), dispatcher);
        controller.set_model(Some(model.model().clone()));

        let weak_model = Arc::downgrade(&model);
        let id = model.theme_changed().connect(move |theme| {
            if let Some(model) = weak_model.upgrade() {
                model.update_status(&format!("Theme changed to: {theme}"));
            }
        });
        let theme_status = Subscription::new(&model, move |m: &ApplicationModel| {
            m.theme_changed().disconnect(id);
        });

        Ok(Self {
            controller,
            hooks,
            _theme_status: theme_status,
        })
    }

    /// The core controller, for binding and signal access.
    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// The application model.
    pub fn model(&self) -> &Arc<ApplicationModel> {
        &self.hooks.model
    }

    /// Bind the main view.
    pub fn set_view(&self, view: Arc<dyn View>) {
        self.controller.set_view(Some(view));
    }

    /// Initialize model, view and controller, then load the user settings.
    ///
    /// Every failure is also reported through `error_occurred`.
    #[tracing::instrument(skip_all, target = "triad::app", level = "debug")]
    pub fn initialize_application(&self) -> AppResult<()> {
        self.hooks.initialize_application(&self.controller)
    }

    /// Start the status ticker. Idempotent.
    pub fn start_application(&self) {
        self.hooks.start_application(&self.controller);
    }

    /// Stop the status ticker and save the user settings. Does nothing if
    /// the application is not started.
    pub fn stop_application(&self) {
        self.hooks.stop_application();
    }

    /// Whether [`start_application`](Self::start_application) ran and the
    /// application has not stopped since.
    pub fn is_started(&self) -> bool {
        self.hooks.started.load(Ordering::Acquire)
    }

    /// Whether a document action is queued or running.
    pub fn has_pending_operation(&self) -> bool {
        self.hooks.in_flight.load(Ordering::Acquire)
    }

    /// Route a user action as if the view had reported it.
    pub fn handle_user_action(&self, name: &str, data: impl Into<Value>) {
        self.controller.handle_user_action(name, &data.into());
    }

    /// Run the long simulated operation.
    pub fn simulate_long_operation(&self) {
        self.handle_user_action("long", Value::Null);
    }

    /// `"<title> - v<version>"` as of the last view update.
    pub fn window_title(&self) -> String {
        self.hooks.window_title.read().clone()
    }

    /// Stop the application and wait for queued work to finish.
    ///
    /// Completion callbacks of that work are left on the dispatcher.
    pub fn shutdown(&self) {
        self.stop_application();
        self.hooks.worker.stop_and_join();
    }
}

impl std::fmt::Debug for ApplicationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationController")
            .field("controller", &self.controller)
            .field("started", &self.is_started())
            .field("pending", &self.has_pending_operation())
            .finish()
    }
}

static_assertions::assert_impl_all!(ApplicationController: Send, Sync);
