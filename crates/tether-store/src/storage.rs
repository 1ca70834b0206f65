//! # Snapshot Storage Capability
//!
//! The durable-storage seam of the queue. The engine only ever loads once at
//! startup and saves after every mutation; everything else is the backend's
//! business.
//!
//! ```text
//!        ActionStore (tether-sync)
//!              │ load() once / save() after each mutation
//!              ▼
//!   ┌─────────────────────┐
//!   │  SnapshotStorage    │
//!   └──────────┬──────────┘
//!        ┌─────┴──────┐
//!        ▼            ▼
//!  SqliteStorage  MemoryStorage
//!   (durable)     (tests, embedding)
//! ```

use std::future::Future;
use std::sync::Arc;

use tether_core::QueueSnapshot;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Trait
// =============================================================================

/// Durable storage for the queue snapshot.
pub trait SnapshotStorage: Send + Sync + 'static {
    /// Loads the persisted snapshot. `Ok(None)` means nothing was ever saved.
    fn load(&self) -> impl Future<Output = StoreResult<Option<QueueSnapshot>>> + Send;

    /// Replaces the persisted snapshot.
    fn save(&self, snapshot: &QueueSnapshot) -> impl Future<Output = StoreResult<()>> + Send;
}

// =============================================================================
// In-Memory Backend
// =============================================================================

#[derive(Debug, Default)]
struct MemoryCell {
    raw: Option<String>,
    fail_loads: bool,
    fail_saves: bool,
    saves: usize,
}

/// Snapshot storage held in process memory as raw JSON.
///
/// Clones share the same cell, so a test can keep one handle to inspect or
/// corrupt what the queue wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    cell: Arc<Mutex<MemoryCell>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `raw` already stored, exactly as given.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        MemoryStorage {
            cell: Arc::new(Mutex::new(MemoryCell {
                raw: Some(raw.into()),
                ..MemoryCell::default()
            })),
        }
    }

    /// Returns the stored bytes.
    pub async fn raw(&self) -> Option<String> {
        self.cell.lock().await.raw.clone()
    }

    /// Makes subsequent loads fail.
    pub async fn fail_loads(&self, fail: bool) {
        self.cell.lock().await.fail_loads = fail;
    }

    /// Makes subsequent saves fail, leaving the stored bytes untouched.
    pub async fn fail_saves(&self, fail: bool) {
        self.cell.lock().await.fail_saves = fail;
    }

    /// Number of successful saves.
    pub async fn save_count(&self) -> usize {
        self.cell.lock().await.saves
    }
}

impl SnapshotStorage for MemoryStorage {
    async fn load(&self) -> StoreResult<Option<QueueSnapshot>> {
        let cell = self.cell.lock().await;
        if cell.fail_loads {
            return Err(StoreError::Unavailable("load refused".to_string()));
        }

        match &cell.raw {
            Some(raw) => Ok(Some(QueueSnapshot::from_json(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> StoreResult<()> {
        let raw = snapshot.to_json()?;

        let mut cell = self.cell.lock().await;
        if cell.fail_saves {
            return Err(StoreError::Unavailable("save refused".to_string()));
        }

        debug!(actions = snapshot.len(), "Snapshot saved to memory");
        cell.raw = Some(raw);
        cell.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tether_core::NewAction;

    #[tokio::test]
    async fn test_empty_storage_loads_none() {
        let storage = MemoryStorage::new();
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let snapshot = QueueSnapshot::new(
            vec![NewAction::user_action(json!({"tap": 1})).into_record(now)],
            now,
        );

        storage.save(&snapshot).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(snapshot));
        assert_eq!(storage.save_count().await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_bytes_surface_as_error() {
        let storage = MemoryStorage::with_raw("][");
        let err = storage.load().await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptSnapshot(_)));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_bytes() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage.save(&QueueSnapshot::new(vec![], now)).await.unwrap();
        let before = storage.raw().await;

        storage.fail_saves(true).await;
        let snapshot = QueueSnapshot::new(
            vec![NewAction::analytics_event(json!({})).into_record(now)],
            now,
        );
        assert!(storage.save(&snapshot).await.is_err());
        assert_eq!(storage.raw().await, before);
    }
}
