//! # tether-store: Durable Snapshot Storage
//!
//! The storage capability the queue engine is given at construction time,
//! plus its two backends.
//!
//! ## Modules
//!
//! - [`storage`] - `SnapshotStorage` trait and the in-memory backend
//! - [`sqlite`] - SQLite backend and pool configuration
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Storage error types
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use tether_store::{SnapshotStorage, SqliteConfig, SqliteStorage};
//!
//! let storage = SqliteStorage::open(SqliteConfig::new("./tether.db"), "offline-queue").await?;
//! let snapshot = storage.load().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod sqlite;
pub mod storage;

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteConfig, SqliteStorage};
pub use storage::{MemoryStorage, SnapshotStorage};
