//! Observer registry and broadcast.
//!
//! The registry maps observer ids to bounded channel senders behind a
//! mutex. A broadcast snapshots the senders, releases the lock, and then
//! delivers, so subscribes and unsubscribes never contend with delivery
//! and a removal during a broadcast cannot disturb its iteration.
//! An observer whose channel is closed or full is removed; the others
//! are unaffected.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::notification::Notification;

/// Frames buffered per observer before it counts as stalled.
pub const DEFAULT_BUFFER: usize = 16;

/// Shortest heartbeat period; shorter requests are raised to it.
pub const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// Identity of one observer connection within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

#[derive(Debug)]
struct Registry {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<Notification>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, mpsc::Sender<Notification>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let removed = observers.remove(&id).is_some();
        if removed {
            tracing::info!(observer = %id, total = observers.len(), "observer disconnected");
        }
        removed
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers the notification was queued for.
    pub delivered: usize,
    /// Observers dropped because delivery failed.
    pub dropped: usize,
}

/// Registry of connected observers.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Creates a bus buffering [`DEFAULT_BUFFER`] frames per observer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    /// Creates a bus buffering `buffer` frames per observer (at least one).
    #[must_use]
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                observers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Registers a new observer.
    ///
    /// The observer stays registered until the returned [`Subscription`]
    /// is dropped, [`unsubscribe`](Self::unsubscribe) is called, or a
    /// delivery to it fails.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = ObserverId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.registry.buffer);
        let total = {
            let mut observers = self.registry.lock();
            let _ = observers.insert(id, tx);
            observers.len()
        };
        tracing::info!(observer = %id, total, "observer connected");
        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Removes an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.registry.remove(id)
    }

    /// Queues `notification` for every registered observer.
    pub fn broadcast(&self, notification: Notification) -> BroadcastReport {
        broadcast_to(&self.registry, notification)
    }

    /// Removes every observer. Returns how many were registered.
    ///
    /// Each subscription ends once its queued notifications are drained.
    pub fn disconnect_all(&self) -> usize {
        let removed = std::mem::take(&mut *self.registry.lock()).len();
        tracing::info!(removed, "disconnected all observers");
        removed
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns whether `id` is registered.
    #[must_use]
    pub fn is_subscribed(&self, id: ObserverId) -> bool {
        self.registry.lock().contains_key(&id)
    }

    /// Spawns a task broadcasting [`Notification::Ping`] every `period`.
    ///
    /// The first ping is sent one period after spawning. A period below
    /// [`MIN_HEARTBEAT`] is raised to it. Observers a ping cannot reach are
    /// removed as in [`EventBus::broadcast`]. The task ends on its own once
    /// every handle to the bus has been dropped.
    #[must_use]
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_HEARTBEAT);
        let registry = Arc::downgrade(&self.registry);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                let _ = ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let report = broadcast_to(&registry, Notification::Ping);
                tracing::trace!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "heartbeat sent"
                );
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn broadcast_to(registry: &Registry, notification: Notification) -> BroadcastReport {
    let snapshot: Vec<(ObserverId, mpsc::Sender<Notification>)> = registry
        .lock()
        .iter()
        .map(|(id, tx)| (*id, tx.clone()))
        .collect();

    let mut report = BroadcastReport::default();
    let mut failed = Vec::new();
    for (id, tx) in snapshot {
        match tx.try_send(notification) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::debug!(observer = %id, error = %e, "delivery failed");
                failed.push(id);
            }
        }
    }

    if !failed.is_empty() {
        let mut observers = registry.lock();
        for id in &failed {
            if observers.remove(id).is_some() {
                report.dropped += 1;
            }
        }
        tracing::info!(
            dropped = report.dropped,
            total = observers.len(),
            "removed unreachable observers"
        );
    }
    tracing::debug!(
        event = %notification,
        delivered = report.delivered,
        "broadcast"
    );
    report
}

/// One observer's end of the bus.
///
/// Dropping it unregisters the observer.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    receiver: mpsc::Receiver<Notification>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Returns this observer's id.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once the observer has been removed from the bus and
    /// every queued notification has been received.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Returns a queued notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }

    /// Converts the subscription into a stream of notifications.
    ///
    /// Dropping the stream unregisters the observer.
    pub fn into_stream(self) -> impl Stream<Item = Notification> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|n| (n, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let _ = registry.remove(self.id);
        }
    }
}
