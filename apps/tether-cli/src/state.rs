//! # Queue State
//!
//! Builds the process's single queue instance from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tether_store::{SqliteConfig, SqliteStorage};
use tether_sync::{HttpTransport, OfflineQueue, QueueConfig};
use tracing::{debug, info};

pub type CliQueue = OfflineQueue<SqliteStorage, HttpTransport>;

/// Opens the SQLite snapshot store and the HTTP transport, then the queue.
pub async fn open_queue(
    config: QueueConfig,
    auth_token: Option<String>,
) -> anyhow::Result<CliQueue> {
    let path = config
        .database_path()
        .context("Could not determine database path; set [storage] database_path")?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    }
    debug!(path = %path.display(), "Opening queue database");

    let storage_key = config.queue.storage_key.clone();
    let storage = SqliteStorage::open(SqliteConfig::new(path.clone()), storage_key)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut transport = HttpTransport::new(&config.transport)?;
    if let Some(token) = auth_token {
        let bearer = format!("Bearer {token}");
        transport = transport.with_header_provider(Arc::new(move || {
            BTreeMap::from([("Authorization".to_string(), bearer.clone())])
        }));
    }

    let queue = OfflineQueue::open(config, storage, transport).await?;
    info!(path = %path.display(), "Queue ready");
    Ok(queue)
}
