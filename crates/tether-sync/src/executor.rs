//! # Sync Executor
//!
//! The drain loop. At most one pass runs at a time.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──trigger──► acquire flag ──busy──► DrainOutcome::Busy          │
//! │                          │                                              │
//! │                          ├──queue empty──► DrainOutcome::Empty         │
//! │                          ▼                                              │
//! │                      Draining ◄───────────────────────┐                │
//! │                          │ re-scan: first record not   │                │
//! │                          │ yet attempted in this pass  │                │
//! │                          ▼                             │                │
//! │                      Attempting ──► Succeeded ─────────┤ item delay     │
//! │                          │     ──► RetriableFailed ────┤                │
//! │                          │     ──► Dropped ────────────┘                │
//! │                          ▼                                              │
//! │                  nothing left ──► release flag                          │
//! │                                   ──► DrainOutcome::Completed(result)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pass Semantics
//! - Records enqueued while a pass runs are picked up by the same pass.
//! - Each record is attempted at most once per pass.
//! - A failing record never aborts the pass.
//! - The flag is released by a guard, so a dropped drain future cannot
//!   leave the queue locked.
//! - The flag is released inside the final scan, so no record can be
//!   appended between "nothing left" and "idle".

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether_core::{ActionRecord, QueueStatus, SyncResult};
use tether_store::SnapshotStorage;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::SyncError;
use crate::network::{DrainTrigger, NetworkAwareness};
use crate::notifier::{Notifier, QueueEvent};
use crate::store::{ActionStore, RetryOutcome};
use crate::transport::{ActionRequest, Transport};

// =============================================================================
// Outcomes
// =============================================================================

/// What a drain request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another pass was already running; nothing was done.
    Busy,
    /// Nothing was queued; no pass was declared.
    Empty,
    /// A pass ran to completion.
    Completed(SyncResult),
}

impl DrainOutcome {
    /// The pass result, or the empty result when no pass ran.
    pub fn into_result(self) -> SyncResult {
        match self {
            DrainOutcome::Completed(result) => result,
            DrainOutcome::Busy | DrainOutcome::Empty => SyncResult::empty(),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DrainOutcome::Busy)
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    RetriableFailed,
    Dropped { error: String },
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Pause between records.
    pub item_delay: Duration,
    /// Upper bound on one transport call.
    pub call_timeout: Duration,
    /// Drop 4xx-equivalent failures without spending retries.
    pub drop_permanent_failures: bool,
}

impl From<&QueueConfig> for ExecutorSettings {
    fn from(config: &QueueConfig) -> Self {
        ExecutorSettings {
            item_delay: config.item_delay(),
            call_timeout: config.transport_timeout(),
            drop_permanent_failures: config.queue.drop_permanent_failures,
        }
    }
}

// =============================================================================
// Drain Guard
// =============================================================================

/// Holds the drain flag; clears it on drop.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| DrainGuard { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Executor
// =============================================================================

pub struct SyncExecutor<S, T> {
    store: Arc<ActionStore<S>>,
    transport: T,
    network: Arc<NetworkAwareness>,
    notifier: Arc<Notifier>,
    settings: ExecutorSettings,
    draining: AtomicBool,
    attempts_started: AtomicU64,
}

impl<S: SnapshotStorage, T: Transport> SyncExecutor<S, T> {
    pub fn new(
        store: Arc<ActionStore<S>>,
        transport: T,
        network: Arc<NetworkAwareness>,
        notifier: Arc<Notifier>,
        settings: ExecutorSettings,
    ) -> Self {
        SyncExecutor {
            store,
            transport,
            network,
            notifier,
            settings,
            draining: AtomicBool::new(false),
            attempts_started: AtomicU64::new(0),
        }
    }

    /// True while a pass holds the flag.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Attempts started since construction.
    pub fn attempts_started(&self) -> u64 {
        self.attempts_started.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current `queue-updated` payload.
    pub async fn status(&self) -> QueueStatus {
        QueueStatus {
            length: self.store.len().await,
            is_processing: self.is_draining(),
            is_online: self.network.is_online(),
        }
    }

    pub async fn publish_status(&self) {
        let status = self.status().await;
        self.notifier.publish(QueueEvent::QueueUpdated(status)).await;
    }

    /// Runs one pass unless another is in progress or the queue is empty.
    pub async fn drain(&self, trigger: DrainTrigger) -> DrainOutcome {
        let Some(guard) = DrainGuard::acquire(&self.draining) else {
            debug!(%trigger, "Drain already in progress, request ignored");
            return DrainOutcome::Busy;
        };
        let mut guard = Some(guard);

        let mut attempted = HashSet::new();
        let mut result = SyncResult::empty();

        loop {
            if !attempted.is_empty()
                && !self.settings.item_delay.is_zero()
                && self.store.has_pending(&attempted).await
            {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            // The flag clears under the store lock: a concurrent enqueue
            // either joins this pass or finds the executor idle.
            let Some(record) = self
                .store
                .next_pending_or_else(&attempted, || drop(guard.take()))
                .await
            else {
                break;
            };

            if attempted.is_empty() {
                let queued = self.store.len().await;
                info!(%trigger, queued, "Drain pass started");
                self.publish_status().await;
            }
            attempted.insert(record.id.clone());

            match self.attempt(&record).await {
                AttemptOutcome::Succeeded => result.successful += 1,
                AttemptOutcome::RetriableFailed => result.failed += 1,
                AttemptOutcome::Dropped { error } => {
                    result.failed += 1;
                    result.errors.push(error);
                }
            }
            result.total += 1;

            self.publish_status().await;
        }

        if attempted.is_empty() {
            debug!(%trigger, "Queue empty, nothing to drain");
            return DrainOutcome::Empty;
        }

        info!(
            %trigger,
            successful = result.successful,
            failed = result.failed,
            total = result.total,
            dropped = result.errors.len(),
            "Drain pass completed"
        );

        self.publish_status().await;
        self.notifier
            .publish(QueueEvent::SyncCompleted(result.clone()))
            .await;

        DrainOutcome::Completed(result)
    }

    /// Executes one record and applies the retry/drop policy.
    async fn attempt(&self, record: &ActionRecord) -> AttemptOutcome {
        self.attempts_started.fetch_add(1, Ordering::SeqCst);
        debug!(
            id = %record.id,
            kind = %record.kind,
            retry_count = record.retry_count,
            "Attempting action"
        );

        let request = ActionRequest::from(record);
        let outcome = match tokio::time::timeout(
            self.settings.call_timeout,
            self.transport.execute(&request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Timeout(self.settings.call_timeout.as_secs())),
        };

        let failure = match outcome {
            Ok(()) => {
                self.store.remove(&record.id).await;
                info!(id = %record.id, kind = %record.kind, "Action delivered");
                return AttemptOutcome::Succeeded;
            }
            Err(e) => e,
        };

        if failure.is_permanent() && self.settings.drop_permanent_failures {
            self.store.remove(&record.id).await;
            error!(
                id = %record.id,
                kind = %record.kind,
                error = %failure,
                "Permanent failure, action dropped"
            );
            return AttemptOutcome::Dropped {
                error: format!("Permanent failure for {}: {}", record.kind, failure),
            };
        }

        match self.store.increment_retry(&record.id).await {
            RetryOutcome::Retained { retry_count } => {
                warn!(
                    id = %record.id,
                    kind = %record.kind,
                    retry_count,
                    max_retries = record.max_retries,
                    error = %failure,
                    "Action failed, will retry"
                );
                AttemptOutcome::RetriableFailed
            }
            RetryOutcome::Dropped => {
                error!(
                    id = %record.id,
                    kind = %record.kind,
                    max_retries = record.max_retries,
                    error = %failure,
                    "Max retries exceeded, action dropped"
                );
                AttemptOutcome::Dropped {
                    error: format!("Max retries exceeded for {}: {}", record.kind, failure),
                }
            }
            RetryOutcome::Missing => {
                debug!(id = %record.id, "Action removed while in flight");
                AttemptOutcome::RetriableFailed
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
