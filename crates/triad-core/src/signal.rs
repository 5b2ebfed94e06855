//! Signal/slot system for Triad.
//!
//! Signals are the observer channels of the runtime: property stores, models,
//! controllers and views all publish their notifications through a
//! [`Signal<Args>`], and collaborators connect slots (closures) to them.
//!
//! - [`Signal<Args>`]: a notification channel carrying `Args` to each slot
//! - [`ConnectionId`]: handle returned by `connect`, used to disconnect
//! - [`ConnectionType`]: delivery rule for dispatcher-bound slots
//! - [`Subscription`]: disconnects its slot when dropped
//!
//! # Re-entrancy
//!
//! The connection table is locked only long enough to take a snapshot of the
//! connected slots. Slots therefore run with no signal lock held and may
//! connect, disconnect, or emit (including on the same signal). A slot that is
//! disconnected while an emission is in flight is not invoked by the rest of
//! that emission.
//!
//! # Cross-thread delivery
//!
//! [`Signal::connect`] delivers slots directly on the emitting thread.
//! [`Signal::connect_queued`] ties the connection to a [`Dispatcher`] so the
//! slot can be marshalled onto the dispatcher's owner thread.
//!
//! ```
//! use triad_core::Signal;
//!
//! let status_changed = Signal::<String>::new();
//! let id = status_changed.connect(|status| println!("status: {status}"));
//!
//! status_changed.emit("Saving document...".to_string());
//! assert!(status_changed.disconnect(id));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::dispatch::Dispatcher;

new_key_type! {
    /// Identifies one slot on one signal. Pass it to [`Signal::disconnect`].
    pub struct ConnectionId;
}

/// Specifies how a dispatcher-bound slot is invoked when the signal is emitted.
///
/// Used with [`Signal::connect_queued`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Invoke the slot immediately in the emitting thread.
    Direct,

    /// Always post the slot to the dispatcher, even from the owner thread.
    ///
    /// Useful to defer handling until the current call stack unwinds.
    Queued,

    /// Direct on the dispatcher's owner thread, queued from any other thread.
    #[default]
    Auto,
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// How a single connection is delivered.
#[derive(Clone)]
enum Delivery {
    Direct,
    Dispatched {
        connection_type: ConnectionType,
        dispatcher: Dispatcher,
    },
}

struct Connection<Args> {
    slot: Slot<Args>,
    delivery: Delivery,
}

/// An observer channel with any number of connected slots.
///
/// Slots receive `&Args`; notifications without a payload use `()` and
/// several values travel as a tuple such as `(String, Value)`. Emission may
/// happen on any thread, so slots must be `Send + Sync`.
pub struct Signal<Args> {
    connections: Arc<Mutex<SlotMap<ConnectionId, Connection<Args>>>>,
    blocked: AtomicBool,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a signal with no slots.
    pub fn new() -> Self {
        Self {
            connections: Arc::new(Mutex::new(SlotMap::with_key())),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot that runs on whichever thread emits.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(Arc::new(slot), Delivery::Direct)
    }

    /// Connect a slot whose delivery is routed through `dispatcher`.
    ///
    /// See [`ConnectionType`] for the delivery rules.
    pub fn connect_queued<F>(
        &self,
        dispatcher: &Dispatcher,
        connection_type: ConnectionType,
        slot: F,
    ) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(
            Arc::new(slot),
            Delivery::Dispatched {
                connection_type,
                dispatcher: dispatcher.clone(),
            },
        )
    }

    fn insert(&self, slot: Slot<Args>, delivery: Delivery) -> ConnectionId {
        self.connections.lock().insert(Connection { slot, delivery })
    }

    /// Remove the slot behind `id`. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Remove every slot.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Whether `id` is still connected.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(id)
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Suppress emissions until unblocked.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emissions are suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Deliver `args` to every slot.
    ///
    /// Slots run in connection order. Direct slots run before this call
    /// returns; dispatched slots may instead be posted to their dispatcher,
    /// each receiving its own clone of `args`.
    #[tracing::instrument(skip_all, target = "triad_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "triad_core::signal", "signal blocked, skipping emit");
            return;
        }

        let snapshot: Vec<(ConnectionId, Slot<Args>, Delivery)> = {
            let connections = self.connections.lock();
            connections
                .iter()
                .map(|(id, conn)| (id, conn.slot.clone(), conn.delivery.clone()))
                .collect()
        };
        tracing::trace!(target: "triad_core::signal", connection_count = snapshot.len(), "emitting signal");

        for (id, slot, delivery) in snapshot {
            // An earlier slot may have disconnected this one.
            if !self.is_connected(id) {
                continue;
            }
            match delivery {
                Delivery::Direct => slot(&args),
                Delivery::Dispatched {
                    connection_type,
                    dispatcher,
                } => {
                    let inline = match connection_type {
                        ConnectionType::Direct => true,
                        ConnectionType::Queued => false,
                        ConnectionType::Auto => dispatcher.is_owner_thread(),
                    };
                    if inline {
                        slot(&args);
                    } else {
                        self.queue_invocation(&dispatcher, id, slot, args.clone());
                    }
                }
            }
        }
    }

    /// Post a slot invocation to the dispatcher.
    ///
    /// The connection is re-checked when the task runs, so disconnecting
    /// before the queue is drained cancels the delivery.
    fn queue_invocation(&self, dispatcher: &Dispatcher, id: ConnectionId, slot: Slot<Args>, args: Args) {
        let connections = Arc::downgrade(&self.connections);
        dispatcher.post(move || {
            let still_connected = connections
                .upgrade()
                .is_some_and(|connections| connections.lock().contains_key(id));
            if still_connected {
                slot(&args);
            } else {
                tracing::trace!(target: "triad_core::signal", "dropping queued slot for disconnected connection");
            }
        });
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().len())
            .field("blocked", &self.blocked.load(Ordering::SeqCst))
            .finish()
    }
}

/// A subscription that disconnects itself when dropped.
///
/// Subscriptions hold only a weak reference to the object that owns the
/// signal, so they never keep a model or view alive. Controllers keep their
/// model and view bindings as lists of subscriptions and drop them on rebind.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use triad_core::{Signal, Subscription};
///
/// struct Thermometer {
///     reading: Signal<f64>,
/// }
///
/// let thermometer = Arc::new(Thermometer { reading: Signal::new() });
/// let id = thermometer.reading.connect(|_| {});
/// let subscription = Subscription::new(&thermometer, move |t: &Thermometer| {
///     t.reading.disconnect(id);
/// });
///
/// assert_eq!(thermometer.reading.connection_count(), 1);
/// drop(subscription);
/// assert_eq!(thermometer.reading.connection_count(), 0);
/// ```
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription that runs `detach` against `owner` when dropped,
    /// if the owner is still alive.
    pub fn new<O, F>(owner: &Arc<O>, detach: F) -> Self
    where
        O: ?Sized + Send + Sync + 'static,
        F: FnOnce(&O) + Send + Sync + 'static,
    {
        let owner = Arc::downgrade(owner);
        Self {
            detach: Some(Box::new(move || {
                if let Some(owner) = owner.upgrade() {
                    detach(&*owner);
                }
            })),
        }
    }

    /// Disconnect now.
    pub fn disconnect(mut self) {
        self.run_detach();
    }

    /// Keep the connection alive for the lifetime of the signal.
    pub fn forget(mut self) {
        self.detach = None;
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
static_assertions::assert_impl_all!(Subscription: Send, Sync);
