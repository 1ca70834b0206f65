//! Long-running host loop.

use std::sync::Arc;

use tether_sync::{ManualConnectivity, QueueEvent, TcpProbe};
use tracing::{info, warn};

use crate::shutdown_signal;
use crate::state::CliQueue;

/// How often the TCP probe re-checks the destination.
const PROBE_INTERVAL_SECS: u64 = 15;

/// Drains on connectivity changes and on the periodic timer until
/// Ctrl+C or SIGTERM.
///
/// With a base URL, reachability comes from a TCP probe of that host.
/// Without one there is nothing to probe and the queue stays at its
/// configured starting state.
pub async fn run(queue: &CliQueue) -> anyhow::Result<()> {
    queue
        .subscribe(Arc::new(|event: &QueueEvent| match event {
            QueueEvent::QueueUpdated(status) => info!(
                length = status.length,
                processing = status.is_processing,
                online = status.is_online,
                "queue-updated"
            ),
            QueueEvent::SyncCompleted(result) => info!(
                successful = result.successful,
                failed = result.failed,
                total = result.total,
                errors = ?result.errors,
                "sync-completed"
            ),
        }))
        .await;

    let interval = std::time::Duration::from_secs(PROBE_INTERVAL_SECS);
    let (handle, _connectivity) = match queue.config().base_url() {
        Some(base_url) => {
            let probe = TcpProbe::for_base_url(base_url, interval)?;
            info!(address = probe.address(), "Probing destination reachability");
            (queue.start(probe), None)
        }
        None => {
            warn!("No base_url configured, connectivity will not be probed");
            let (observer, connectivity) = ManualConnectivity::channel();
            (queue.start(observer), Some(connectivity))
        }
    };

    let stats = queue.stats().await;
    info!(queued = stats.queue_length, online = stats.is_online, "Queue running");

    shutdown_signal().await;
    handle.shutdown().await;

    let stats = queue.stats().await;
    info!(remaining = stats.queue_length, "Queue stopped");
    Ok(())
}
