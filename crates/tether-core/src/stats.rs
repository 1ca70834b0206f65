//! Queue introspection aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActionRecord, Priority};

/// Payload of a `queue-updated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub length: usize,
    pub is_processing: bool,
    pub is_online: bool,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_length: usize,
    pub is_online: bool,
    pub is_processing: bool,
    /// Every bucket is present, zero-filled.
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_kind: BTreeMap<String, usize>,
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
    pub newest_enqueued_at: Option<DateTime<Utc>>,
    /// Set once a snapshot write has failed, cleared by the next success.
    pub persistence_degraded: bool,
}

impl QueueStats {
    /// Aggregates over the records currently held by the store.
    pub fn collect(
        records: &[ActionRecord],
        is_online: bool,
        is_processing: bool,
        persistence_degraded: bool,
    ) -> Self {
        let mut by_priority: BTreeMap<Priority, usize> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut by_kind = BTreeMap::new();

        for record in records {
            *by_priority.entry(record.priority).or_insert(0) += 1;
            *by_kind.entry(record.kind.clone()).or_insert(0) += 1;
        }

        QueueStats {
            queue_length: records.len(),
            is_online,
            is_processing,
            by_priority,
            by_kind,
            oldest_enqueued_at: records.iter().map(|r| r.enqueued_at).min(),
            newest_enqueued_at: records.iter().map(|r| r.enqueued_at).max(),
            persistence_degraded,
        }
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            length: self.queue_length,
            is_processing: self.is_processing,
            is_online: self.is_online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::NewAction;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_empty_queue() {
        let stats = QueueStats::collect(&[], true, false, false);
        assert_eq!(stats.queue_length, 0);
        assert_eq!(stats.by_priority.len(), 4);
        assert!(stats.by_priority.values().all(|n| *n == 0));
        assert!(stats.oldest_enqueued_at.is_none());
    }

    #[test]
    fn test_counts_sum_to_length() {
        let now = Utc::now();
        let records = vec![
            NewAction::content_save(json!({}), None).into_record(now),
            NewAction::analytics_event(json!({})).into_record(now + Duration::seconds(1)),
            NewAction::analytics_event(json!({})).into_record(now + Duration::seconds(2)),
            NewAction::user_action(json!({})).into_record(now + Duration::seconds(3)),
        ];

        let stats = QueueStats::collect(&records, false, true, false);
        assert_eq!(stats.queue_length, 4);
        assert_eq!(stats.by_priority.values().sum::<usize>(), 4);
        assert_eq!(stats.by_kind.values().sum::<usize>(), 4);
        assert_eq!(stats.by_priority[&Priority::Low], 2);
        assert_eq!(stats.by_kind["analytics_event"], 2);
        assert_eq!(stats.oldest_enqueued_at, Some(now));
        assert_eq!(stats.newest_enqueued_at, Some(now + Duration::seconds(3)));

        let status = stats.status();
        assert_eq!(status.length, 4);
        assert!(status.is_processing);
        assert!(!status.is_online);
    }
}
