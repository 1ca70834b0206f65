//! # Offline Queue
//!
//! The single entry point producers and hosts use.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OfflineQueue (Clone)                            │
//! │                                                                         │
//! │   enqueue ─┐                                  ┌─ report(HostSignal)     │
//! │   clear  ──┤                                  ├─ periodic_tick          │
//! │   stats  ──┤      ┌──────────────────┐        ├─ force_sync             │
//! │            └────► │   ActionStore    │ ◄──────┤                         │
//! │                   └────────▲─────────┘        ▼                         │
//! │                            │           ┌──────────────┐                │
//! │                            └───────────┤ SyncExecutor │──► Transport   │
//! │                                        └──────┬───────┘                │
//! │                                               ▼                         │
//! │                                           Notifier ──► subscribers      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `start` wires a [`ConnectivityObserver`] and the periodic scheduler to the
//! queue and returns a [`QueueHandle`] for stopping them.
//!
//! ## Example
//! ```rust,ignore
//! let queue = OfflineQueue::open(config, storage, transport).await?;
//! let handle = queue.start(observer);
//!
//! let id = queue
//!     .enqueue_content_save(json!({"title": "Draft"}), Some("42"))
//!     .await;
//!
//! handle.shutdown().await;
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tether_core::{ActionId, ActionRecord, NewAction, QueueStats, QueueStatus, SyncResult};
use tether_store::SnapshotStorage;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::config::QueueConfig;
use crate::error::QueueResult;
use crate::executor::{DrainOutcome, ExecutorSettings, SyncExecutor};
use crate::network::{ConnectivityObserver, DrainTrigger, HostSignal, NetworkAwareness};
use crate::notifier::{Notifier, QueueEvent, QueueEventListener, SubscriptionId};
use crate::periodic::{PeriodicHandle, PeriodicScheduler};
use crate::store::ActionStore;
use crate::transport::Transport;

/// Drains spawned by triggers, joined on shutdown.
type BackgroundDrains = Arc<Mutex<JoinSet<()>>>;

struct QueueInner<S, T> {
    config: QueueConfig,
    store: Arc<ActionStore<S>>,
    executor: SyncExecutor<S, T>,
    network: Arc<NetworkAwareness>,
    notifier: Arc<Notifier>,
    drains: BackgroundDrains,
}

/// Durable outbox of deferred actions.
///
/// Cloning is cheap; clones share the same queue.
pub struct OfflineQueue<S, T> {
    inner: Arc<QueueInner<S, T>>,
}

impl<S, T> Clone for OfflineQueue<S, T> {
    fn clone(&self) -> Self {
        OfflineQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<S: SnapshotStorage, T: Transport> OfflineQueue<S, T> {
    /// Validates `config` and loads the persisted snapshot.
    ///
    /// An unreadable snapshot is logged and the queue starts empty.
    pub async fn open(config: QueueConfig, storage: S, transport: T) -> QueueResult<Self> {
        config.validate()?;

        let store = Arc::new(ActionStore::load(storage).await);
        let network = Arc::new(NetworkAwareness::new(config.queue.start_online));
        let notifier = Arc::new(Notifier::new());
        let executor = SyncExecutor::new(
            store.clone(),
            transport,
            network.clone(),
            notifier.clone(),
            ExecutorSettings::from(&config),
        );

        info!(
            storage_key = %config.queue.storage_key,
            queued = store.len().await,
            online = network.is_online(),
            "Offline queue opened"
        );

        Ok(OfflineQueue {
            inner: Arc::new(QueueInner {
                config,
                store,
                executor,
                network,
                notifier,
                drains: BackgroundDrains::default(),
            }),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    // =========================================================================
    // Producer API
    // =========================================================================

    /// Queues an action. Never fails from the caller's point of view.
    pub async fn enqueue(&self, action: NewAction) -> ActionId {
        let record = action.into_record(Utc::now());
        let kind = record.kind.clone();
        let priority = record.priority;

        let id = self.inner.store.append(record).await;
        info!(id = %id, kind = %kind, %priority, "Action enqueued");

        self.inner.executor.publish_status().await;

        if self.inner.config.queue.sync_on_enqueue
            && self.inner.network.is_online()
            && !self.inner.executor.is_draining()
        {
            self.spawn_drain(DrainTrigger::Enqueue);
        }

        id
    }

    /// Content save: high priority, 5 retries.
    pub async fn enqueue_content_save(
        &self,
        content: Value,
        content_id: Option<&str>,
    ) -> ActionId {
        self.enqueue(NewAction::content_save(content, content_id)).await
    }

    /// Analytics event: low priority, 2 retries.
    pub async fn enqueue_analytics_event(&self, event: Value) -> ActionId {
        self.enqueue(NewAction::analytics_event(event)).await
    }

    /// User action: medium priority, 3 retries.
    pub async fn enqueue_user_action(&self, action: Value) -> ActionId {
        self.enqueue(NewAction::user_action(action)).await
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn stats(&self) -> QueueStats {
        let records = self.inner.store.records().await;
        QueueStats::collect(
            &records,
            self.inner.network.is_online(),
            self.inner.executor.is_draining(),
            self.inner.store.persistence_degraded(),
        )
    }

    pub async fn status(&self) -> QueueStatus {
        self.inner.executor.status().await
    }

    /// Pending records in drain order.
    pub async fn snapshot(&self) -> Vec<ActionRecord> {
        self.inner.store.snapshot().await
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.executor.is_draining()
    }

    /// Transport attempts started since the queue was opened.
    pub fn attempts_started(&self) -> u64 {
        self.inner.executor.attempts_started()
    }

    pub fn transport(&self) -> &T {
        self.inner.executor.transport()
    }

    pub fn storage(&self) -> &S {
        self.inner.store.storage()
    }

    // =========================================================================
    // Operator API
    // =========================================================================

    /// Drops every pending record. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let removed = self.inner.store.clear().await;
        info!(removed, "Queue cleared");
        self.inner.executor.publish_status().await;
        removed
    }

    /// Drains now, regardless of connectivity.
    ///
    /// Returns the empty result if a pass was already running.
    pub async fn force_sync(&self) -> SyncResult {
        self.request_drain(DrainTrigger::Forced).await.into_result()
    }

    pub async fn request_drain(&self, trigger: DrainTrigger) -> DrainOutcome {
        self.inner.executor.drain(trigger).await
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Applies a host signal and starts a drain in the background if it
    /// calls for one.
    pub async fn report(&self, signal: HostSignal) -> Option<DrainTrigger> {
        let was_online = self.inner.network.is_online();
        let queued = self.inner.store.len().await;
        let trigger = self.inner.network.observe(signal, queued);

        if self.inner.network.is_online() != was_online {
            self.inner.executor.publish_status().await;
        }

        if let Some(trigger) = trigger {
            self.spawn_drain(trigger);
        }
        trigger
    }

    /// Periodic safety net: drains only when online, non-empty and idle.
    pub async fn periodic_tick(&self) -> Option<DrainOutcome> {
        if !self.inner.network.is_online() {
            debug!("Periodic tick skipped, offline");
            return None;
        }
        if self.inner.executor.is_draining() {
            debug!("Periodic tick skipped, drain in progress");
            return None;
        }
        if self.inner.store.is_empty().await {
            return None;
        }

        Some(self.request_drain(DrainTrigger::Periodic).await)
    }

    fn spawn_drain(&self, trigger: DrainTrigger) {
        let queue = self.clone();
        let mut drains = self
            .inner
            .drains
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Reap finished drains so the set stays small on long runs.
        while drains.try_join_next().is_some() {}

        drains.spawn(async move {
            if queue.request_drain(trigger).await.is_busy() {
                debug!(%trigger, "Background drain coalesced into running pass");
            }
        });
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub async fn subscribe(&self, listener: Arc<dyn QueueEventListener>) -> SubscriptionId {
        self.inner.notifier.subscribe(listener).await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id).await
    }

    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.notifier.events()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawns the network monitor and the periodic scheduler.
    pub fn start<O: ConnectivityObserver>(&self, observer: O) -> QueueHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let monitor = tokio::spawn(Self::monitor(self.clone(), observer, shutdown_rx));

        let (scheduler, periodic) = PeriodicScheduler::new(self.inner.config.periodic_interval());
        let queue = self.clone();
        let ticker = tokio::spawn(scheduler.run(move || {
            let queue = queue.clone();
            async move {
                queue.periodic_tick().await;
            }
        }));

        info!("Offline queue started");

        QueueHandle {
            shutdown_tx,
            periodic,
            tasks: vec![monitor, ticker],
            drains: self.inner.drains.clone(),
        }
    }

    async fn monitor<O: ConnectivityObserver>(
        queue: Self,
        mut observer: O,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                signal = observer.next_signal() => match signal {
                    Some(signal) => {
                        debug!(?signal, "Host signal received");
                        queue.report(signal).await;
                    }
                    None => {
                        info!("Connectivity observer closed");
                        break;
                    }
                },

                _ = shutdown_rx.recv() => {
                    info!("Network monitor received shutdown");
                    break;
                }
            }
        }

        info!("Network monitor stopped");
    }
}

// =============================================================================
// Queue Handle
// =============================================================================

/// Stops the background tasks spawned by [`OfflineQueue::start`].
pub struct QueueHandle {
    shutdown_tx: mpsc::Sender<()>,
    periodic: PeriodicHandle,
    tasks: Vec<JoinHandle<()>>,
    drains: BackgroundDrains,
}

impl QueueHandle {
    /// Signals both tasks and waits for them to finish, then waits for any
    /// background drain still in flight.
    ///
    /// In-flight drains are never interrupted; they finish their pass and
    /// persist its outcome before this returns.
    pub async fn shutdown(self) {
        info!("Shutting down offline queue");

        // Either task may already be gone.
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.periodic.shutdown().await;

        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Queue task ended abnormally");
            }
        }

        // A drain may still be spawned by a late enqueue; loop until none is left.
        loop {
            let mut pending = std::mem::take(
                &mut *self.drains.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                break;
            }

            debug!(count = pending.len(), "Waiting for background drains");
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Background drain ended abnormally");
                }
            }
        }

        info!("Offline queue stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
