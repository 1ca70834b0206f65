//! # SQLite Snapshot Storage
//!
//! Connection pool setup and the `queue_snapshots` table backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Snapshot Storage                            │
//! │                                                                         │
//! │  Host Startup                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteConfig::new(path) ← Configure pool settings                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteStorage::open(config, key).await ← Create pool + run migrations │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────────┐                     │
//! │  │ queue_snapshots                               │                     │
//! │  │ storage_key │ version │ payload │ saved_at    │                     │
//! │  │ ────────────┼─────────┼─────────┼──────────── │                     │
//! │  │ offline-... │ 1       │ {json}  │ 2024-...    │  ← upserted per save│
//! │  └───────────────────────────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File-backed databases run in WAL mode with NORMAL synchronous, so a crash
//! leaves the last committed snapshot intact.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tether_core::QueueSnapshot;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migrations;
use crate::storage::SnapshotStorage;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite pool configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = SqliteConfig::new("/path/to/tether.db").max_connections(2);
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file. Created if missing.
    pub database_path: PathBuf,

    /// Default: 2 (one writer plus a reader for diagnostics)
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,

    in_memory: bool,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            database_path: path.into(),
            max_connections: 2,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            in_memory: false,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// In-memory database (for testing).
    ///
    /// Pinned to a single connection that never idles out, since every
    /// new connection would see a fresh empty database.
    pub fn in_memory() -> Self {
        SqliteConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            in_memory: true,
        }
    }

    fn connect_options(&self) -> StoreResult<SqliteConnectOptions> {
        if self.in_memory {
            return SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()));
        }

        let connect_url = format!("sqlite://{}?mode=rwc", self.database_path.display());
        let options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        Ok(options)
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Snapshot storage backed by one row of a SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    storage_key: String,
}

impl SqliteStorage {
    /// Opens the pool and runs migrations (if enabled).
    ///
    /// ## Returns
    /// * `Ok(SqliteStorage)` - Ready to load/save under `storage_key`
    /// * `Err(StoreError)` - Connection or migration failed
    pub async fn open(config: SqliteConfig, storage_key: impl Into<String>) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing snapshot database"
        );

        let connect_options = config.connect_options()?;

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.in_memory {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Snapshot database pool created"
        );

        if config.run_migrations {
            migrations::run_migrations(&pool).await?;
        }

        Ok(SqliteStorage {
            pool,
            storage_key: storage_key.into(),
        })
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Connection pool, for diagnostics and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Writes `raw` as the payload without encoding it.
    pub async fn save_raw(&self, raw: &str) -> StoreResult<()> {
        self.upsert(0, raw, chrono::Utc::now()).await
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        info!("Closing snapshot database pool");
        self.pool.close().await;
    }

    async fn upsert(
        &self,
        version: u32,
        payload: &str,
        saved_at: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_snapshots (storage_key, version, payload, saved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(storage_key) DO UPDATE SET
                version = excluded.version,
                payload = excluded.payload,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(&self.storage_key)
        .bind(i64::from(version))
        .bind(payload)
        .bind(saved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SnapshotStorage for SqliteStorage {
    async fn load(&self) -> StoreResult<Option<QueueSnapshot>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM queue_snapshots WHERE storage_key = ?")
                .bind(&self.storage_key)
                .fetch_optional(&self.pool)
                .await?;

        match payload {
            Some(raw) => {
                let snapshot = QueueSnapshot::from_json(&raw)?;
                debug!(
                    key = %self.storage_key,
                    actions = snapshot.len(),
                    version = snapshot.version,
                    "Snapshot loaded"
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> StoreResult<()> {
        let payload = snapshot.to_json()?;
        self.upsert(snapshot.version, &payload, snapshot.saved_at)
            .await?;

        debug!(
            key = %self.storage_key,
            actions = snapshot.len(),
            "Snapshot saved"
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
