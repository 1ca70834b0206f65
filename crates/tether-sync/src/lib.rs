//! # tether-sync: Offline Queue Engine
//!
//! Runs the durable outbox: producers enqueue actions at any time, and the
//! engine replays them against a transport whenever connectivity allows.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Offline Queue Engine                            │
//! │                                                                         │
//! │   Producers                 Host                                        │
//! │   (enqueue, stats,          (ConnectivityObserver,                      │
//! │    clear, force_sync)        periodic timer)                            │
//! │        │                         │                                      │
//! │        ▼                         ▼                                      │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                        OfflineQueue                               │ │
//! │  └──────┬───────────────────────┬────────────────────────┬──────────┘ │
//! │         ▼                       ▼                        ▼            │
//! │  ┌──────────────┐      ┌─────────────────┐      ┌────────────────┐    │
//! │  │ ActionStore  │◄─────│  SyncExecutor   │─────►│   Transport    │    │
//! │  │ (snapshot    │      │  (one pass at a │      │  (HttpTransport│    │
//! │  │  per change) │      │   time)         │      │   or injected) │    │
//! │  └──────┬───────┘      └────────┬────────┘      └────────────────┘    │
//! │         ▼                       ▼                                      │
//! │  SnapshotStorage            Notifier ──► queue-updated / sync-completed│
//! │  (tether-store)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`queue`] - `OfflineQueue` facade and `QueueHandle`
//! - [`executor`] - Drain loop, retry and drop policy
//! - [`store`] - In-memory record set mirrored to storage
//! - [`network`] - Connectivity/visibility tracking and observers
//! - [`periodic`] - Safety-net drain timer
//! - [`notifier`] - Event fan-out
//! - [`transport`] - Transport capability and the reqwest backend
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_store::{SqliteConfig, SqliteStorage};
//! use tether_sync::{HttpTransport, OfflineQueue, QueueConfig, TcpProbe};
//!
//! let config = QueueConfig::load_or_default(None);
//! let storage = SqliteStorage::open(SqliteConfig::new(path), &config.queue.storage_key).await?;
//! let transport = HttpTransport::new(&config.transport)?;
//!
//! let queue = OfflineQueue::open(config, storage, transport).await?;
//! let handle = queue.start(TcpProbe::for_base_url(base_url, interval)?);
//!
//! queue.enqueue_analytics_event(serde_json::json!({"name": "open"})).await;
//! println!("{:?}", queue.stats().await);
//!
//! handle.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod executor;
pub mod network;
pub mod notifier;
pub mod periodic;
pub mod queue;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{QueueConfig, QueueSettings, StorageSettings, TransportSettings};
pub use error::{QueueResult, SyncError};
pub use executor::{AttemptOutcome, DrainOutcome, ExecutorSettings, SyncExecutor};
pub use network::{
    ConnectivityHandle, ConnectivityObserver, DrainTrigger, HostSignal, ManualConnectivity,
    NetworkAwareness, TcpProbe, Visibility,
};
pub use notifier::{Notifier, QueueEvent, QueueEventListener, SubscriptionId};
pub use periodic::{PeriodicHandle, PeriodicScheduler, DEFAULT_PERIOD};
pub use queue::{OfflineQueue, QueueHandle};
pub use store::{ActionStore, RetryOutcome};
pub use transport::{ActionRequest, HeaderProvider, HttpTransport, Transport};
