//! Background threads used by the application controller.
//!
//! - [`Worker`] runs tasks one at a time on a dedicated thread and hands each
//!   result back through a [`Dispatcher`], so completion callbacks run on the
//!   presentation thread.
//! - [`Ticker`] calls a closure at a fixed interval until it is stopped.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use parking_lot::Mutex;
use triad_core::Dispatcher;

type Job = Box<dyn FnOnce() + Send>;

enum WorkerTask {
    Execute(Job),
    Shutdown,
}

struct WorkerState {
    running: AtomicBool,
    pending: AtomicUsize,
}

/// A dedicated thread with its own task queue.
///
/// Tasks run sequentially in submission order. Stopping the worker lets it
/// finish the queued tasks before the thread exits.
pub struct Worker {
    sender: Sender<WorkerTask>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<WorkerState>,
    dispatcher: Option<Dispatcher>,
}

impl Worker {
    /// Spawn a worker thread named `name`.
    ///
    /// Callbacks of [`send_with_callback`](Self::send_with_callback) are
    /// posted to `dispatcher`, or run on the worker thread if there is none.
    pub fn new(name: &str, dispatcher: Option<Dispatcher>) -> io::Result<Self> {
        let (sender, receiver) = unbounded();
        let state = Arc::new(WorkerState {
            running: AtomicBool::new(true),
            pending: AtomicUsize::new(0),
        });

        let thread_state = state.clone();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            worker_loop(receiver, &thread_state);
            thread_state.running.store(false, Ordering::Release);
        })?;

        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
            state,
            dispatcher,
        })
    }

    /// Whether the worker still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Number of queued or running tasks.
    pub fn pending_tasks(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Queue `task`. Returns `false` if the worker has been stopped.
    pub fn send<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            return false;
        }
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(WorkerTask::Execute(Box::new(task))).is_err() {
            self.state.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Queue `task` and deliver its result to `callback` through the
    /// dispatcher.
    pub fn send_with_callback<T, F, C>(&self, task: F, callback: C) -> bool
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.send(move || {
            let result = task();
            match dispatcher {
                Some(dispatcher) => dispatcher.post(move || callback(result)),
                None => callback(result),
            }
        })
    }

    /// Stop accepting tasks. Already queued tasks still run.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::AcqRel) {
            let _ = self.sender.send(WorkerTask::Shutdown);
        }
    }

    /// Wait for the worker thread to exit. Returns `false` if it was already
    /// joined or panicked.
    pub fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) if handle.thread().id() != thread::current().id() => handle.join().is_ok(),
            _ => false,
        }
    }

    /// [`stop`](Self::stop) followed by [`join`](Self::join).
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("running", &self.is_running())
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<WorkerTask>, state: &WorkerState) {
    while let Ok(task) = receiver.recv() {
        match task {
            WorkerTask::Execute(job) => {
                job();
                state.pending.fetch_sub(1, Ordering::AcqRel);
            }
            WorkerTask::Shutdown => {
                while let Ok(WorkerTask::Execute(job)) = receiver.try_recv() {
                    job();
                    state.pending.fetch_sub(1, Ordering::AcqRel);
                }
                break;
            }
        }
    }
    tracing::trace!(target: "triad::worker", "worker loop exited");
}

/// Calls a closure at a fixed interval on its own thread.
///
/// The first call happens one interval after [`start`](Self::start).
pub struct Ticker {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start ticking every `interval`.
    pub fn start<F>(name: &str, interval: Duration, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = unbounded::<()>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let ticks = tick(interval);
            loop {
                select! {
                    recv(ticks) -> _ => on_tick(),
                    recv(stopped) -> _ => break,
                }
            }
        })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Worker: Send, Sync);
