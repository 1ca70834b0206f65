//! Operator commands.

use serde_json::json;
use tracing::warn;

use super::print_json;
use crate::state::CliQueue;

pub async fn stats(queue: &CliQueue) -> anyhow::Result<()> {
    print_json(&queue.stats().await)
}

/// Drains regardless of connectivity and prints the pass result.
pub async fn sync(queue: &CliQueue) -> anyhow::Result<()> {
    let result = queue.force_sync().await;
    for error in &result.errors {
        warn!(%error, "Action dropped");
    }
    print_json(&result)
}

pub async fn clear(queue: &CliQueue) -> anyhow::Result<()> {
    let removed = queue.clear().await;
    print_json(&json!({ "removed": removed }))
}
