//! Live observer registry and event fan-out.
//!
//! One [`BroadcastHub`] exists per process. It is constructed at startup
//! and cloned into every component that needs to publish.
//!
//! Each observer owns a bounded queue drained by its own delivery task,
//! which applies the per-send timeout. [`BroadcastHub::broadcast`] only
//! enqueues, so a slow observer delays neither the caller nor the other
//! observers. Enqueueing for a broadcast happens under a dispatch lock,
//! giving every observer the same FIFO order of broadcast calls.

use devasthan_types::LiveEvent;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, Notify, RwLock,
};
use uuid::Uuid;

/// Opaque identifier of one observer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of an observer as seen by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// Reserved while the transport handshake completes; receives nothing.
    Connecting,
    /// Receives every broadcast.
    Connected,
    /// Terminal. Also reported for ids the hub has never seen.
    Disconnected,
}

/// Why a delivery to one observer failed.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("observer channel closed")]
    Closed,
    #[error("observer queue full")]
    QueueFull,
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// The write half of one observer's live channel.
pub trait ObserverSink: Send + 'static {
    /// Writes one serialized event.
    fn deliver(&mut self, payload: Arc<str>) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Called once after the hub stops delivering to this sink.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl ObserverSink for mpsc::Sender<String> {
    async fn deliver(&mut self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.send(payload.to_string())
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Fires once the hub has dropped an observer, whoever initiated it.
///
/// Returned by [`BroadcastHub::attach`] so the transport can tear down the
/// read side of a connection the hub gave up on.
#[derive(Debug, Clone)]
pub struct RemovalNotice(Arc<Notify>);

impl RemovalNotice {
    /// Resolves when the observer is removed. Returns at once if it already was.
    pub async fn removed(&self) {
        self.0.notified().await;
    }
}

/// Hub tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// Upper bound on a single write to one observer.
    pub send_timeout: Duration,
    /// Events buffered per observer before it is treated as stalled.
    pub queue_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(2),
            queue_capacity: 256,
        }
    }
}

/// Outcome of one [`BroadcastHub::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connected observers in the snapshot.
    pub attempted: usize,
    /// Observers whose queue accepted the event.
    pub enqueued: usize,
    /// Observers removed because their queue was full or closed.
    pub dropped: usize,
}

struct LiveObserver {
    queue: mpsc::Sender<Arc<str>>,
    live: Arc<AtomicBool>,
    removed: Arc<Notify>,
}

enum Slot {
    Pending,
    Live(LiveObserver),
}

struct HubInner {
    observers: RwLock<HashMap<ObserverId, Slot>>,
    /// Serialises enqueueing so concurrent broadcasts reach every queue in one order.
    dispatch: Mutex<()>,
    settings: HubSettings,
}

/// Registry of connected observers.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

impl BroadcastHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            inner: Arc::new(HubInner {
                observers: RwLock::new(HashMap::new()),
                dispatch: Mutex::new(()),
                settings: HubSettings {
                    queue_capacity: settings.queue_capacity.max(1),
                    ..settings
                },
            }),
        }
    }

    /// Reserves an id for a connection whose handshake is still in progress.
    pub async fn reserve(&self) -> ObserverId {
        let id = ObserverId::new();
        self.inner.observers.write().await.insert(id, Slot::Pending);
        tracing::debug!(observer_id = %id, "observer connecting");
        id
    }

    /// Registers a sink and returns its id. Shorthand for `reserve` + `attach`.
    pub async fn connect<S: ObserverSink>(&self, sink: S) -> ObserverId {
        let id = self.reserve().await;
        self.attach(id, sink).await;
        id
    }

    /// Moves a reserved id to `Connected` and starts its delivery task.
    ///
    /// Returns `None` (and closes the sink) if the id was disconnected
    /// before the handshake finished.
    pub async fn attach<S: ObserverSink>(&self, id: ObserverId, mut sink: S) -> Option<RemovalNotice> {
        let (queue_tx, queue_rx) = mpsc::channel(self.inner.settings.queue_capacity);
        let live = Arc::new(AtomicBool::new(true));
        let removed = Arc::new(Notify::new());

        let attached = {
            let mut observers = self.inner.observers.write().await;
            match observers.get_mut(&id) {
                Some(slot) if matches!(slot, Slot::Pending) => {
                    *slot = Slot::Live(LiveObserver {
                        queue: queue_tx,
                        live: live.clone(),
                        removed: removed.clone(),
                    });
                    true
                }
                _ => false,
            }
        };

        if !attached {
            tracing::debug!(observer_id = %id, "attach for unknown or cancelled observer");
            let _ = tokio::time::timeout(self.inner.settings.send_timeout, sink.close()).await;
            return None;
        }

        tokio::spawn(run_delivery(
            Arc::downgrade(&self.inner),
            id,
            sink,
            queue_rx,
            live,
            self.inner.settings.send_timeout,
        ));

        tracing::info!(observer_id = %id, "observer connected");
        Some(RemovalNotice(removed))
    }

    /// Forgets an observer. Idempotent; returns whether it was known.
    ///
    /// Events already queued for it are discarded; a send already in
    /// flight may still complete.
    pub async fn disconnect(&self, id: ObserverId) -> bool {
        let removed = self.inner.observers.write().await.remove(&id);
        match removed {
            Some(Slot::Live(observer)) => {
                observer.live.store(false, Ordering::Release);
                observer.removed.notify_one();
                tracing::info!(observer_id = %id, "observer disconnected");
                true
            }
            Some(Slot::Pending) => {
                tracing::debug!(observer_id = %id, "observer abandoned during handshake");
                true
            }
            None => false,
        }
    }

    pub async fn state(&self, id: ObserverId) -> ObserverState {
        match self.inner.observers.read().await.get(&id) {
            Some(Slot::Pending) => ObserverState::Connecting,
            Some(Slot::Live(_)) => ObserverState::Connected,
            None => ObserverState::Disconnected,
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.inner
            .observers
            .read()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub async fn observer_ids(&self) -> Vec<ObserverId> {
        self.inner
            .observers
            .read()
            .await
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Serializes `event` once and fans it out to every connected observer.
    pub async fn broadcast(&self, event: &LiveEvent) -> BroadcastReport {
        match serde_json::to_string(event) {
            Ok(json) => self.broadcast_json(json.into()).await,
            Err(e) => {
                tracing::error!(kind = event.kind(), "failed to serialize live event: {}", e);
                BroadcastReport::default()
            }
        }
    }

    /// Fans out a pre-serialized payload.
    ///
    /// Observers connected when the call starts are targeted; one whose
    /// queue is full or closed is removed. Never blocks on an observer.
    pub async fn broadcast_json(&self, payload: Arc<str>) -> BroadcastReport {
        let mut failed = Vec::new();
        let mut report = BroadcastReport::default();

        {
            let _order = self.inner.dispatch.lock().await;

            let snapshot: Vec<(ObserverId, mpsc::Sender<Arc<str>>)> = {
                let observers = self.inner.observers.read().await;
                observers
                    .iter()
                    .filter_map(|(id, slot)| match slot {
                        Slot::Live(observer) => Some((*id, observer.queue.clone())),
                        Slot::Pending => None,
                    })
                    .collect()
            };
            report.attempted = snapshot.len();

            for (id, queue) in snapshot {
                match queue.try_send(payload.clone()) {
                    Ok(()) => report.enqueued += 1,
                    Err(TrySendError::Full(_)) => failed.push((id, DeliveryError::QueueFull)),
                    Err(TrySendError::Closed(_)) => failed.push((id, DeliveryError::Closed)),
                }
            }
        }

        report.dropped = failed.len();
        for (id, reason) in failed {
            tracing::warn!(observer_id = %id, error = %reason, "dropping observer after failed enqueue");
            self.disconnect(id).await;
        }

        report
    }
}

async fn run_delivery<S: ObserverSink>(
    hub: Weak<HubInner>,
    id: ObserverId,
    mut sink: S,
    mut queue: mpsc::Receiver<Arc<str>>,
    live: Arc<AtomicBool>,
    send_timeout: Duration,
) {
    while let Some(payload) = queue.recv().await {
        if !live.load(Ordering::Acquire) {
            break;
        }

        let failure = match tokio::time::timeout(send_timeout, sink.deliver(payload)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(DeliveryError::TimedOut(send_timeout)),
        };

        if let Some(reason) = failure {
            tracing::warn!(observer_id = %id, error = %reason, "observer delivery failed, removing");
            if let Some(inner) = hub.upgrade() {
                BroadcastHub { inner }.disconnect(id).await;
            }
            break;
        }
    }

    if tokio::time::timeout(send_timeout, sink.close()).await.is_err() {
        tracing::debug!(observer_id = %id, "observer close timed out");
    }
    tracing::debug!(observer_id = %id, "observer delivery task finished");
}
