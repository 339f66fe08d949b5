//! Update multiplexer: one producer, any number of independently paced
//! subscribers.
//!
//! ```text
//!   Publisher ──send().await──► ingress (cap 1) ──► dispatch task
//!                                                        │ try_send
//!                              ┌─────────────────────────┼──────────────┐
//!                              ▼                         ▼              ▼
//!                        [queue S1]                [queue S2]     [queue Sn]
//!                              │                         │              │
//!                          session                   session        session
//! ```
//!
//! The producer waits for the dispatch task to accept each update. The
//! dispatch task never waits on a subscriber: a full queue drops the update
//! for that subscriber only. The subscriber set and its closed flag sit
//! behind one mutex that is held for registration, removal and one dispatch
//! pass, never across an await.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use modes_core::PlaneSnapshot;

/// Queue capacity of subscribers registered with [`UpdateMultiplexer::subscribe`]
/// unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The multiplexer the viewer runs: snapshots are shared, not copied, per subscriber.
pub type PlaneUpdates = UpdateMultiplexer<Arc<PlaneSnapshot>>;

pub type SubscriberId = u64;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MuxError {
    #[error("update multiplexer is shut down")]
    Closed,
}

/// Counters exposed on `/api/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MuxStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Slot<T> {
    delivery: mpsc::Sender<T>,
    stop: oneshot::Sender<()>,
}

/// Registered subscribers. Once `closed` is set nothing is inserted again.
struct Registry<T> {
    closed: bool,
    slots: BTreeMap<SubscriberId, Slot<T>>,
}

struct Shared<T> {
    subscribers: Mutex<Registry<T>>,
    next_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<T: Clone> Shared<T> {
    fn new() -> Self {
        Shared {
            subscribers: Mutex::new(Registry {
                closed: false,
                slots: BTreeMap::new(),
            }),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, Registry<T>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer `update` to every registered subscriber without waiting.
    fn dispatch(&self, update: T) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let subscribers = self.subscribers();
        for (&id, slot) in subscribers.slots.iter() {
            match slot.delivery.try_send(update.clone()) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(subscriber = id, "subscriber queue full, update dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    // Receiver gone; its session will unsubscribe
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(subscriber = id, "subscriber queue closed, update dropped");
                }
            }
        }
    }

    /// Remove a subscriber and fire its stop signal. False if it was unknown.
    fn remove(&self, id: SubscriberId) -> bool {
        let slot = self.subscribers().slots.remove(&id);
        match slot {
            Some(slot) => {
                let _ = slot.stop.send(());
                true
            }
            None => false,
        }
    }
}

async fn run_dispatch<T: Clone>(
    shared: Arc<Shared<T>>,
    mut ingress: mpsc::Receiver<T>,
    mut halt: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = halt.changed() => break,
            update = ingress.recv() => match update {
                Some(update) => shared.dispatch(update),
                None => break,
            },
        }
    }
    ingress.close();
    tracing::debug!("dispatch loop stopped");
}

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

/// Fans updates from one ingress out to every registered subscriber.
pub struct UpdateMultiplexer<T> {
    shared: Arc<Shared<T>>,
    ingress: mpsc::Sender<T>,
    halt: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    queue_capacity: usize,
}

impl<T: Clone + Send + 'static> UpdateMultiplexer<T> {
    /// Start the dispatch task. Must be called from within a tokio runtime.
    ///
    /// `queue_capacity` is the default per-subscriber queue size.
    pub fn new(queue_capacity: usize) -> Self {
        let shared = Arc::new(Shared::new());
        let (ingress, ingress_rx) = mpsc::channel(1);
        let (halt, halt_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(run_dispatch(Arc::clone(&shared), ingress_rx, halt_rx));

        UpdateMultiplexer {
            shared,
            ingress,
            halt,
            dispatcher: Mutex::new(Some(dispatcher)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// The single ingress point for the producer.
    pub fn publisher(&self) -> Publisher<T> {
        Publisher {
            ingress: self.ingress.clone(),
        }
    }

    /// Register a subscriber with the default queue capacity.
    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribe_with_capacity(self.queue_capacity)
    }

    /// Register a subscriber whose queue holds at most `capacity` updates.
    ///
    /// Once [`shutdown`](Self::shutdown) has drained the subscriber set the
    /// returned subscription is already stopped.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription<T> {
        let capacity = capacity.max(1);
        let (delivery, updates) = mpsc::channel(capacity);
        let (stop_tx, stop) = oneshot::channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.shared.subscribers();
        if subscribers.closed {
            let _ = stop_tx.send(());
        } else {
            subscribers.slots.insert(
                id,
                Slot {
                    delivery,
                    stop: stop_tx,
                },
            );
            tracing::info!(
                subscriber = id,
                capacity,
                subscribers = subscribers.slots.len(),
                "subscriber registered"
            );
        }
        drop(subscribers);

        Subscription {
            id,
            updates,
            stop,
            stopped: false,
        }
    }

    /// Remove a subscriber, signal its stop channel and release its queue.
    ///
    /// Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.shared.remove(id) {
            tracing::info!(
                subscriber = id,
                subscribers = self.subscriber_count(),
                "subscriber removed"
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers().slots.len()
    }

    pub fn stats(&self) -> MuxStats {
        MuxStats {
            subscribers: self.subscriber_count(),
            published: self.shared.published.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Close the ingress and unsubscribe everyone. Safe to call repeatedly.
    ///
    /// Returns once the dispatch task has stopped; from then on
    /// [`Publisher::publish`] fails with [`MuxError::Closed`].
    pub async fn shutdown(&self) {
        self.halt.send_replace(true);

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "dispatch task failed");
            }
        }

        let drained = {
            let mut subscribers = self.shared.subscribers();
            subscribers.closed = true;
            std::mem::take(&mut subscribers.slots)
        };
        let count = drained.len();
        for (_, slot) in drained {
            let _ = slot.stop.send(());
        }
        if count > 0 {
            tracing::info!(subscribers = count, "multiplexer shut down");
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Producer side. Cheap to clone; every clone feeds the same ingress.
pub struct Publisher<T> {
    ingress: mpsc::Sender<T>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Publisher {
            ingress: self.ingress.clone(),
        }
    }
}

impl<T> Publisher<T> {
    /// Hand an update to the dispatch task, waiting until it is accepted.
    pub async fn publish(&self, update: T) -> Result<(), MuxError> {
        self.ingress
            .send(update)
            .await
            .map_err(|_| MuxError::Closed)
    }
}

/// Consumer side: a bounded update queue plus a stop signal.
pub struct Subscription<T> {
    id: SubscriberId,
    updates: mpsc::Receiver<T>,
    stop: oneshot::Receiver<()>,
    stopped: bool,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next update. `None` once the subscription is stopped.
    ///
    /// A stop signal wins over updates still queued.
    pub async fn next(&mut self) -> Option<T> {
        if self.stopped {
            return None;
        }
        tokio::select! {
            biased;
            _ = &mut self.stop => {
                self.stopped = true;
                None
            }
            update = self.updates.recv() => update,
        }
    }

    /// Take a queued update without waiting. `None` once the subscription
    /// is stopped, even with updates still queued.
    pub fn try_next(&mut self) -> Option<T> {
        if self.stopped {
            return None;
        }
        match self.stop.try_recv() {
            Ok(()) | Err(TryRecvError::Closed) => {
                self.stopped = true;
                None
            }
            Err(TryRecvError::Empty) => self.updates.try_recv().ok(),
        }
    }
}
