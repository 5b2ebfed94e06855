//! Interactive console front end.
//!
//! Reads one command per line from standard input:
//!
//! ```text
//! <action> [payload]   new, open, save, test [message], long, theme <name>, refresh
//! help                 list the commands
//! quit                 save settings and exit
//! ```
//!
//! An optional first argument names a configuration file; otherwise
//! `config.toml` in the platform config directory is used if present.

use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use triad::logging::{self, APP_TARGET};
use triad::{AppConfig, AppResult, ApplicationController, ApplicationModel, ConfigurationService, ConsoleView};
use triad_core::Dispatcher;

const HELP: &str = "commands: new | open | save | test [message] | long | theme <default|dark|light> | refresh | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Action { name: String, payload: String },
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (name, payload) = match line.split_once(char::is_whitespace) {
        Some((name, payload)) => (name, payload.trim()),
        None => (line, ""),
    };
    match name {
        "" => None,
        "quit" | "exit" => Some(Command::Quit),
        "help" | "?" => Some(Command::Help),
        _ => Some(Command::Action {
            name: name.to_string(),
            payload: payload.to_string(),
        }),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("triad: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> AppResult<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default()?,
    };
    let _logging = logging::init(&config.logging)?;

    let service = Arc::new(match config.default_settings_path() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            ConfigurationService::with_file(path)
        }
        None => ConfigurationService::new(),
    });
    service.initialize();
    if let Err(err) = service.start() {
        tracing::warn!(target: APP_TARGET, error = %err, "continuing with default settings");
    }

    let dispatcher = Dispatcher::new();
    let model = Arc::new(ApplicationModel::new(&config));
    let app = ApplicationController::new(&config, model.clone(), service.clone(), Some(dispatcher.clone()))?;

    let view = ConsoleView::stdout();
    view.set_application_model(model);
    app.set_view(view.clone());
    app.initialize_application()?;
    app.start_application();
    view.with_output(|out| writeln!(out, "{HELP}"))?;

    let quit = Arc::new(AtomicBool::new(false));
    spawn_reader(dispatcher.clone(), view.clone(), quit.clone())?;

    while !quit.load(Ordering::Acquire) {
        dispatcher.process_for(Duration::from_millis(100));
    }

    view.close();
    app.shutdown();
    dispatcher.process_pending();
    service.stop()?;
    tracing::info!(target: APP_TARGET, "bye");
    Ok(())
}

fn spawn_reader(dispatcher: Dispatcher, view: Arc<ConsoleView<io::Stdout>>, quit: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new().name("triad-input".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(target: APP_TARGET, error = %err, "reading stdin failed");
                    break;
                }
            };
            match parse_command(&line) {
                None => {}
                Some(Command::Quit) => break,
                Some(Command::Help) => {
                    let view = view.clone();
                    dispatcher.post(move || {
                        let _ = view.with_output(|out| writeln!(out, "{HELP}"));
                    });
                }
                Some(Command::Action { name, payload }) => {
                    let view = view.clone();
                    dispatcher.post(move || {
                        view.trigger(&name, &payload);
                    });
                }
            }
        }
        quit.store(true, Ordering::Release);
        dispatcher.post(|| {});
    })?;
    Ok(())
}
