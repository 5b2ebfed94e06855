//! Presentation-thread task queue for cross-thread signal delivery.
//!
//! Controllers and views are owned by a single presentation thread. Worker
//! threads are allowed to mutate models, and model notifications fire on the
//! thread that performed the mutation. A [`Dispatcher`] lets those
//! notifications hop back to the presentation thread:
//!
//! 1. A signal connected through [`Signal::connect_queued`](crate::Signal::connect_queued)
//!    remembers the dispatcher it was connected with.
//! 2. When the signal is emitted off the owner thread (or the connection is
//!    [`ConnectionType::Queued`](crate::ConnectionType::Queued)), the slot and
//!    a clone of its arguments are packed into a task and posted here.
//! 3. The presentation loop drains the queue with [`Dispatcher::process_pending`]
//!    or [`Dispatcher::process_for`].
//!
//! # Example
//!
//! ```
//! use triad_core::Dispatcher;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let dispatcher = Dispatcher::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let remote = dispatcher.clone();
//! let hits_clone = hits.clone();
//! std::thread::spawn(move || {
//!     remote.post(move || {
//!         hits_clone.fetch_add(1, Ordering::SeqCst);
//!     });
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(dispatcher.process_pending(), 1);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

/// A type-erased task waiting to run on the owner thread.
pub struct QueuedTask {
    invoke: Box<dyn FnOnce() + Send>,
}

impl QueuedTask {
    /// Wrap a closure for deferred execution.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }

    /// Run the task.
    pub fn execute(self) {
        (self.invoke)();
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask").finish_non_exhaustive()
    }
}

struct DispatcherInner {
    sender: Sender<QueuedTask>,
    receiver: Receiver<QueuedTask>,
    owner: ThreadId,
    posted: AtomicU64,
    executed: AtomicU64,
}

/// A cloneable handle to the presentation thread's task queue.
///
/// The thread that calls [`Dispatcher::new`] becomes the owner thread. Any
/// clone may [`post`](Self::post) from any thread; only the owner should
/// drain the queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher owned by the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(DispatcherInner {
                sender,
                receiver,
                owner: std::thread::current().id(),
                posted: AtomicU64::new(0),
                executed: AtomicU64::new(0),
            }),
        }
    }

    /// The thread that drains this dispatcher.
    pub fn owner_thread(&self) -> ThreadId {
        self.inner.owner
    }

    /// Whether the calling thread is the owner thread.
    pub fn is_owner_thread(&self) -> bool {
        std::thread::current().id() == self.inner.owner
    }

    /// Queue a closure to run on the owner thread.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_task(QueuedTask::new(task));
    }

    /// Queue an already-wrapped task.
    pub fn post_task(&self, task: QueuedTask) {
        self.inner.posted.fetch_add(1, Ordering::Relaxed);
        // The dispatcher holds its own receiver, so the channel can't disconnect.
        let _ = self.inner.sender.send(task);
        tracing::trace!(target: "triad_core::dispatch", pending = self.pending(), "task posted");
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.receiver.len()
    }

    /// Total number of tasks ever posted.
    pub fn posted_count(&self) -> u64 {
        self.inner.posted.load(Ordering::Relaxed)
    }

    /// Total number of tasks executed.
    pub fn executed_count(&self) -> u64 {
        self.inner.executed.load(Ordering::Relaxed)
    }

    /// Run every task that is currently queued, plus any queued by those
    /// tasks, and return how many ran.
    pub fn process_pending(&self) -> usize {
        self.debug_assert_owner();
        let mut count = 0;
        while let Ok(task) = self.inner.receiver.try_recv() {
            self.run(task);
            count += 1;
        }
        count
    }

    /// Run tasks as they arrive until `timeout` elapses.
    ///
    /// Returns how many tasks ran. This is the presentation loop's idle wait.
    pub fn process_for(&self, timeout: Duration) -> usize {
        self.debug_assert_owner();
        let deadline = Instant::now() + timeout;
        let mut count = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inner.receiver.recv_timeout(remaining) {
                Ok(task) => {
                    self.run(task);
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        count
    }

    /// Whether two handles refer to the same queue.
    pub fn same_queue(&self, other: &Dispatcher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn run(&self, task: QueuedTask) {
        task.execute();
        self.inner.executed.fetch_add(1, Ordering::Relaxed);
    }

    fn debug_assert_owner(&self) {
        if !self.is_owner_thread() {
            crate::triad_warn!("dispatcher drained from a thread other than its owner");
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.inner.owner)
            .field("pending", &self.pending())
            .finish()
    }
}

static_assertions::assert_impl_all!(Dispatcher: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_process_pending_runs_in_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            dispatcher.post(move || log.lock().push(i));
        }

        assert_eq!(dispatcher.pending(), 3);
        assert_eq!(dispatcher.process_pending(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(dispatcher.executed_count(), 3);
    }

    #[test]
    fn test_tasks_posted_by_tasks_also_run() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_dispatcher = dispatcher.clone();
        let log_clone = log.clone();
        dispatcher.post(move || {
            log_clone.lock().push("outer");
            let log = log_clone.clone();
            inner_dispatcher.post(move || log.lock().push("inner"));
        });

        assert_eq!(dispatcher.process_pending(), 2);
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_owner_thread() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.is_owner_thread());

        let remote = dispatcher.clone();
        let is_owner = std::thread::spawn(move || remote.is_owner_thread())
            .join()
            .unwrap();
        assert!(!is_owner);
    }

    #[test]
    fn test_process_for_waits_for_remote_post() {
        let dispatcher = Dispatcher::new();
        let remote = dispatcher.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.post(|| {});
        });

        let ran = dispatcher.process_for(Duration::from_millis(500));
        handle.join().unwrap();
        assert_eq!(ran, 1);
    }

    #[test]
    fn test_same_queue() {
        let a = Dispatcher::new();
        let b = a.clone();
        let c = Dispatcher::new();
        assert!(a.same_queue(&b));
        assert!(!a.same_queue(&c));
    }
}
