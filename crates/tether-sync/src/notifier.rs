//! # Notifier
//!
//! Publishes queue-state and sync-result events to any number of observers.
//!
//! ## Delivery Paths
//! ```text
//!                      publish(event)
//!                            │
//!            ┌───────────────┴────────────────┐
//!            ▼                                ▼
//!   registered listeners             broadcast channel
//!   (QueueEventListener,             (events() receivers,
//!    called inline, in order)         lagging receivers skip)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tether_core::{QueueStatus, SyncResult};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Events
// =============================================================================

/// Event published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum QueueEvent {
    /// After every mutation, and at the start and end of a drain pass.
    QueueUpdated(QueueStatus),
    /// After every drain pass that actually ran.
    SyncCompleted(SyncResult),
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::QueueUpdated(_) => "queue-updated",
            QueueEvent::SyncCompleted(_) => "sync-completed",
        }
    }
}

// =============================================================================
// Listener Trait
// =============================================================================

/// Callback observer.
///
/// Called inline on the publishing task, so implementations should return
/// quickly.
pub trait QueueEventListener: Send + Sync {
    fn on_event(&self, event: &QueueEvent);
}

impl<F> QueueEventListener for F
where
    F: Fn(&QueueEvent) + Send + Sync,
{
    fn on_event(&self, event: &QueueEvent) {
        self(event)
    }
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// =============================================================================
// Notifier
// =============================================================================

pub struct Notifier {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn QueueEventListener>)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<QueueEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Notifier {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Registers a callback.
    pub async fn subscribe(&self, listener: Arc<dyn QueueEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().await.push((id, listener));
        id
    }

    /// Removes a callback. Returns false if it was not registered.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// New receiver that sees every event published from now on.
    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub async fn publish(&self, event: QueueEvent) {
        debug!(event = event.name(), "Publishing queue event");

        {
            let listeners = self.listeners.read().await;
            for (_, listener) in listeners.iter() {
                listener.on_event(&event);
            }
        }

        // No receivers is fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn status(length: usize) -> QueueStatus {
        QueueStatus {
            length,
            is_processing: false,
            is_online: true,
        }
    }

    #[tokio::test]
    async fn test_listener_and_channel_both_receive() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        notifier
            .subscribe(Arc::new(move |event: &QueueEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .await;
        let mut rx = notifier.events();

        notifier.publish(QueueEvent::QueueUpdated(status(2))).await;
        notifier
            .publish(QueueEvent::SyncCompleted(SyncResult::empty()))
            .await;

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(rx.recv().await.unwrap(), QueueEvent::QueueUpdated(status(2)));
        assert_eq!(
            rx.recv().await.unwrap(),
            QueueEvent::SyncCompleted(SyncResult::empty())
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let notifier = Notifier::new();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let id = notifier
            .subscribe(Arc::new(move |_: &QueueEvent| {
                *sink.lock().unwrap() += 1;
            }))
            .await;

        notifier.publish(QueueEvent::QueueUpdated(status(0))).await;
        assert!(notifier.unsubscribe(id).await);
        assert!(!notifier.unsubscribe(id).await);
        notifier.publish(QueueEvent::QueueUpdated(status(0))).await;

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = QueueEvent::QueueUpdated(status(3));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "queue-updated");
        assert_eq!(json["data"]["length"], 3);
        assert_eq!(json["data"]["isOnline"], true);
    }
}
