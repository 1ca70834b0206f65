//! # Action Store
//!
//! The authoritative set of pending records and its durable mirror.
//!
//! ## Mutation Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append / remove / increment_retry / clear                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock records ──► mutate Vec ──► storage.save(snapshot) ──► unlock     │
//! │                                       │                                 │
//! │                                       ├── Ok  → degraded = false       │
//! │                                       └── Err → log, degraded = true,  │
//! │                                                 keep in-memory change  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The save runs while the lock is held, so saves land in mutation order and
//! no caller returns while its change is unwritten.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tether_core::{schedule, ActionId, ActionRecord, QueueSnapshot};
use tether_store::SnapshotStorage;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

// =============================================================================
// Retry Outcome
// =============================================================================

/// Result of [`ActionStore::increment_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Still queued with the new count.
    Retained { retry_count: u32 },
    /// Count passed `max_retries`; the record is gone.
    Dropped,
    /// No record with that id.
    Missing,
}

// =============================================================================
// Action Store
// =============================================================================

/// In-memory ordered collection of pending actions, persisted after every
/// mutation.
pub struct ActionStore<S> {
    records: Mutex<Vec<ActionRecord>>,
    storage: S,
    degraded: AtomicBool,
}

impl<S: SnapshotStorage> ActionStore<S> {
    /// Loads the persisted snapshot. Any failure yields an empty store.
    pub async fn load(storage: S) -> Self {
        let records = match storage.load().await {
            Ok(Some(snapshot)) => {
                info!(
                    actions = snapshot.len(),
                    version = snapshot.version,
                    "Loaded queue snapshot"
                );
                snapshot.actions
            }
            Ok(None) => {
                debug!("No queue snapshot persisted yet");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Failed to load queue snapshot, starting empty");
                Vec::new()
            }
        };

        ActionStore {
            records: Mutex::new(records),
            storage,
            degraded: AtomicBool::new(false),
        }
    }

    /// Adds a record and persists. Returns the id it was stored under.
    ///
    /// `enqueued_at` is raised to the previous record's time if the clock
    /// stepped back, and a colliding id is regenerated.
    pub async fn append(&self, mut record: ActionRecord) -> ActionId {
        let mut records = self.records.lock().await;

        if let Some(latest) = records.iter().map(|r| r.enqueued_at).max() {
            if record.enqueued_at < latest {
                record.enqueued_at = latest;
            }
        }

        while records.iter().any(|r| r.id == record.id) {
            warn!(id = %record.id, "Duplicate action id, regenerating");
            record.id = ActionId::generate(Utc::now());
        }

        debug!(
            id = %record.id,
            kind = %record.kind,
            priority = %record.priority,
            "Action appended"
        );
        let id = record.id.clone();
        records.push(record);
        self.persist(&records).await;
        id
    }

    /// Removes a record and persists. Returns false if it was not present.
    pub async fn remove(&self, id: &ActionId) -> bool {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| &r.id != id);

        if records.len() == before {
            debug!(id = %id, "Remove of absent action ignored");
            return false;
        }

        self.persist(&records).await;
        true
    }

    /// Counts one retriable failure, dropping the record once the count
    /// passes its ceiling. Persists either way.
    pub async fn increment_retry(&self, id: &ActionId) -> RetryOutcome {
        let mut records = self.records.lock().await;
        let Some(index) = records.iter().position(|r| &r.id == id) else {
            return RetryOutcome::Missing;
        };

        let record = &mut records[index];
        let next = record.retry_count.saturating_add(1);
        let outcome = if next > record.max_retries {
            records.remove(index);
            RetryOutcome::Dropped
        } else {
            record.retry_count = next;
            RetryOutcome::Retained { retry_count: next }
        };

        self.persist(&records).await;
        outcome
    }

    /// Drops every record and persists the empty snapshot.
    pub async fn clear(&self) -> usize {
        let mut records = self.records.lock().await;
        let removed = records.len();
        records.clear();
        self.persist(&records).await;
        removed
    }

    /// Ordered copy of the pending records.
    pub async fn snapshot(&self) -> Vec<ActionRecord> {
        schedule::order(self.records.lock().await.clone())
    }

    /// Unordered copy, in store order.
    pub async fn records(&self) -> Vec<ActionRecord> {
        self.records.lock().await.clone()
    }

    /// First record in drain order whose id is not in `attempted`.
    ///
    /// When there is none, `on_idle` runs before the lock is released, so an
    /// `append` racing with the end of a pass is ordered after it.
    pub async fn next_pending_or_else(
        &self,
        attempted: &HashSet<ActionId>,
        on_idle: impl FnOnce(),
    ) -> Option<ActionRecord> {
        let records = self.records.lock().await;
        let next = schedule::next_pending(&records, |r| attempted.contains(&r.id)).cloned();
        if next.is_none() {
            on_idle();
        }
        next
    }

    pub async fn has_pending(&self, attempted: &HashSet<ActionId>) -> bool {
        let records = self.records.lock().await;
        records.iter().any(|r| !attempted.contains(&r.id))
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// True while the last snapshot write failed.
    pub fn persistence_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn persist(&self, records: &[ActionRecord]) {
        let snapshot = QueueSnapshot::new(records.to_vec(), Utc::now());

        match self.storage.save(&snapshot).await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    info!(actions = records.len(), "Queue persistence recovered");
                }
            }
            Err(e) => {
                self.degraded.store(true, Ordering::SeqCst);
                error!(
                    error = %e,
                    actions = records.len(),
                    "Failed to persist queue snapshot, continuing in memory"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tether_core::{NewAction, Priority, Verb};
    use tether_store::MemoryStorage;

    fn action(priority: Priority, max_retries: u32) -> ActionRecord {
        NewAction::new("test", "/t", Verb::Post)
            .priority(priority)
            .max_retries(max_retries)
            .into_record(Utc::now())
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let storage = MemoryStorage::new();
        let store = ActionStore::load(storage.clone()).await;

        let record = action(Priority::High, 3);
        let id = record.id.clone();
        store.append(record).await;
        assert_eq!(storage.save_count().await, 1);

        store.increment_retry(&id).await;
        assert_eq!(storage.save_count().await, 2);
        let persisted = storage.load().await.unwrap().unwrap();
        assert_eq!(persisted.actions[0].retry_count, 1);

        store.remove(&id).await;
        assert_eq!(storage.save_count().await, 3);
        assert!(storage.load().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let storage = MemoryStorage::new();
        let store = ActionStore::load(storage.clone()).await;

        assert!(!store.remove(&ActionId::from("missing")).await);
        assert_eq!(storage.save_count().await, 0);
    }

    #[tokio::test]
    async fn test_drop_after_exactly_n_plus_one_failures() {
        let store = ActionStore::load(MemoryStorage::new()).await;
        let record = action(Priority::Low, 2);
        let id = record.id.clone();
        store.append(record).await;

        assert_eq!(
            store.increment_retry(&id).await,
            RetryOutcome::Retained { retry_count: 1 }
        );
        assert_eq!(
            store.increment_retry(&id).await,
            RetryOutcome::Retained { retry_count: 2 }
        );
        assert_eq!(store.increment_retry(&id).await, RetryOutcome::Dropped);
        assert_eq!(store.increment_retry(&id).await, RetryOutcome::Missing);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_retries_drops_on_first_failure() {
        let store = ActionStore::load(MemoryStorage::new()).await;
        let record = action(Priority::Medium, 0);
        let id = record.id.clone();
        store.append(record).await;

        assert_eq!(store.increment_retry(&id).await, RetryOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_loads_empty() {
        let storage = MemoryStorage::with_raw("{{{ definitely not json");
        let store = ActionStore::load(storage).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_load_loads_empty() {
        let storage = MemoryStorage::new();
        storage.fail_loads(true).await;
        let store = ActionStore::load(storage).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_state() {
        let storage = MemoryStorage::new();
        let store = ActionStore::load(storage.clone()).await;

        storage.fail_saves(true).await;
        store.append(action(Priority::High, 1)).await;
        assert_eq!(store.len().await, 1);
        assert!(store.persistence_degraded());
        assert!(storage.raw().await.is_none());

        storage.fail_saves(false).await;
        store.append(action(Priority::Low, 1)).await;
        assert!(!store.persistence_degraded());
        assert_eq!(storage.load().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reload_restores_records() {
        let storage = MemoryStorage::new();
        let store = ActionStore::load(storage.clone()).await;
        store
            .append(NewAction::content_save(json!({"a": 1}), Some("9")).into_record(Utc::now()))
            .await;
        let before = store.records().await;

        let reloaded = ActionStore::load(storage).await;
        assert_eq!(reloaded.records().await, before);
    }

    #[tokio::test]
    async fn test_enqueued_at_never_decreases() {
        let store = ActionStore::load(MemoryStorage::new()).await;
        let now = Utc::now();

        let first = NewAction::user_action(json!({})).into_record(now);
        let earlier = NewAction::user_action(json!({})).into_record(now - Duration::seconds(30));
        store.append(first).await;
        store.append(earlier).await;

        let records = store.records().await;
        assert!(records[1].enqueued_at >= records[0].enqueued_at);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_regenerated() {
        let store = ActionStore::load(MemoryStorage::new()).await;
        let record = action(Priority::High, 1);
        let first = store.append(record.clone()).await;
        let second = store.append(record.clone()).await;

        assert_eq!(first, record.id);
        assert_ne!(second, record.id);
        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, second);
    }

    #[tokio::test]
    async fn test_next_pending_follows_priority() {
        let store = ActionStore::load(MemoryStorage::new()).await;
        let low = action(Priority::Low, 1);
        let critical = action(Priority::Critical, 1);
        store.append(low.clone()).await;
        store.append(critical.clone()).await;

        let mut attempted = HashSet::new();
        let mut idle = false;
        let first = store
            .next_pending_or_else(&attempted, || idle = true)
            .await
            .unwrap();
        assert_eq!(first.id, critical.id);

        attempted.insert(first.id);
        assert!(store.has_pending(&attempted).await);
        let second = store
            .next_pending_or_else(&attempted, || idle = true)
            .await
            .unwrap();
        assert_eq!(second.id, low.id);
        assert!(!idle);

        attempted.insert(low.id);
        assert!(!store.has_pending(&attempted).await);
        assert!(store
            .next_pending_or_else(&attempted, || idle = true)
            .await
            .is_none());
        assert!(idle);
    }

    #[tokio::test]
    async fn test_clear_persists_empty_snapshot() {
        let storage = MemoryStorage::new();
        let store = ActionStore::load(storage.clone()).await;
        store.append(action(Priority::High, 1)).await;
        store.append(action(Priority::Low, 1)).await;

        assert_eq!(store.clear().await, 2);
        assert!(store.is_empty().await);
        assert!(storage.load().await.unwrap().unwrap().is_empty());
    }
}
