//! # tether-core: Pure Data Model for the Offline Action Queue
//!
//! This crate holds everything about the queue that can be expressed without
//! touching a clock source, a disk, or a socket.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tether Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Producers (UI, business logic)                 │   │
//! │  │    content saves ──► analytics events ──► user actions          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ OfflineQueue::enqueue                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tether-sync (engine)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tether-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ schedule  │  │ snapshot  │  │   stats   │  │   │
//! │  │   │ Action-   │  │ priority  │  │ versioned │  │ counts by │  │   │
//! │  │   │  Record   │  │ ordering  │  │   JSON    │  │ priority  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `ActionRecord`, `Priority`, `Verb`, `SyncResult`
//! - [`presets`] - `NewAction` builder and the common action presets
//! - [`schedule`] - Deterministic drain ordering
//! - [`snapshot`] - Versioned durable snapshot format
//! - [`stats`] - Queue introspection aggregates
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use tether_core::{schedule, NewAction, Priority};
//!
//! let now = Utc::now();
//! let low = NewAction::analytics_event(serde_json::json!({"name": "view"})).into_record(now);
//! let critical = NewAction::new("checkout", "/api/checkout", tether_core::Verb::Post)
//!     .priority(Priority::Critical)
//!     .into_record(now);
//!
//! let ordered = schedule::order(vec![low, critical]);
//! assert_eq!(ordered[0].priority, Priority::Critical);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod presets;
pub mod schedule;
pub mod snapshot;
pub mod stats;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use presets::{kinds, NewAction};
pub use snapshot::{QueueSnapshot, SNAPSHOT_VERSION};
pub use stats::{QueueStats, QueueStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Retry ceiling used when a producer does not pick one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
