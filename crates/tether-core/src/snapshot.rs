//! # Queue Snapshot
//!
//! The durable form of the pending-record set.
//!
//! ## Wire Format
//! ```text
//! {
//!   "version": 1,
//!   "savedAt": "2024-01-01T12:00:00Z",
//!   "actions": [ ActionRecord, ... ]
//! }
//! ```
//!
//! ## Legacy Format
//! Version 0 is the browser client's bare array, stored before snapshots were
//! versioned. Its records use `type`/`data`/`url`/`method` and an epoch
//! millisecond `timestamp`; they are converted on decode and written back in
//! the current format on the next save.
//!
//! Snapshots from a newer version are rejected rather than guessed at.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{ActionId, ActionRecord, Priority, Verb};

/// Newest snapshot schema this build reads and the one it writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full durable serialization of the pending-record set, in store order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub actions: Vec<ActionRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredForm {
    Versioned(QueueSnapshot),
    Legacy(Vec<LegacyRecord>),
}

/// One entry of the version 0 array.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    id: ActionId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    url: String,
    method: Verb,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    retry_count: u32,
    max_retries: u32,
    #[serde(default)]
    priority: Priority,
}

impl From<LegacyRecord> for ActionRecord {
    fn from(legacy: LegacyRecord) -> Self {
        ActionRecord {
            id: legacy.id,
            kind: legacy.kind,
            payload: legacy.data,
            target: legacy.url,
            verb: legacy.method,
            headers: legacy.headers,
            enqueued_at: legacy.timestamp,
            retry_count: legacy.retry_count,
            max_retries: legacy.max_retries,
            priority: legacy.priority,
        }
    }
}

impl QueueSnapshot {
    /// Wraps `actions` at the current schema version.
    pub fn new(actions: Vec<ActionRecord>, saved_at: DateTime<Utc>) -> Self {
        QueueSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at,
            actions,
        }
    }

    /// Encodes to the JSON stored under the storage key.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::SnapshotEncode(e.to_string()))
    }

    /// Decodes a stored snapshot, accepting the legacy bare-array form.
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let stored: StoredForm =
            serde_json::from_str(raw).map_err(|e| CoreError::SnapshotDecode(e.to_string()))?;

        let snapshot = match stored {
            StoredForm::Versioned(snapshot) => snapshot,
            StoredForm::Legacy(records) => {
                let actions: Vec<ActionRecord> =
                    records.into_iter().map(ActionRecord::from).collect();
                QueueSnapshot {
                    version: 0,
                    saved_at: actions
                        .iter()
                        .map(|a| a.enqueued_at)
                        .max()
                        .unwrap_or_else(Utc::now),
                    actions,
                }
            }
        };

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(CoreError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::NewAction;
    use serde_json::json;

    fn sample() -> QueueSnapshot {
        let now = Utc::now();
        QueueSnapshot::new(
            vec![
                NewAction::content_save(json!({"body": "hello"}), Some("7")).into_record(now),
                NewAction::analytics_event(json!({"name": "open"}))
                    .header("X-Client", "cli")
                    .into_record(now),
            ],
            now,
        )
    }

    #[test]
    fn test_reload_is_field_for_field_identical() {
        let snapshot = sample();
        let raw = snapshot.to_json().unwrap();
        let reloaded = QueueSnapshot::from_json(&raw).unwrap();
        assert_eq!(reloaded, snapshot);

        // Saving the reloaded snapshot again produces the same bytes.
        assert_eq!(reloaded.to_json().unwrap(), raw);
    }

    #[test]
    fn test_browser_array_is_converted() {
        let raw = json!([
            {
                "id": "action_1700000000000_k3j9x2a1b",
                "type": "save_content",
                "data": {"content": {"title": "Draft"}, "contentId": "42"},
                "url": "/api/content/42",
                "method": "PUT",
                "headers": {},
                "timestamp": 1_700_000_000_000_i64,
                "retryCount": 2,
                "maxRetries": 5,
                "priority": "high"
            },
            {
                "id": "action_1700000005000_p0q1r2s3t",
                "type": "analytics_event",
                "url": "/api/analytics/events",
                "method": "POST",
                "headers": {"X-Client": "web"},
                "timestamp": 1_700_000_005_000_i64,
                "retryCount": 0,
                "maxRetries": 2,
                "priority": "low"
            }
        ])
        .to_string();

        let snapshot = QueueSnapshot::from_json(&raw).unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.len(), 2);

        let save = &snapshot.actions[0];
        assert_eq!(save.id.as_str(), "action_1700000000000_k3j9x2a1b");
        assert_eq!(save.kind, "save_content");
        assert_eq!(save.payload["contentId"], "42");
        assert_eq!(save.target, "/api/content/42");
        assert_eq!(save.verb, Verb::Put);
        assert_eq!(save.enqueued_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!((save.retry_count, save.max_retries), (2, 5));
        assert_eq!(save.priority, Priority::High);

        let event = &snapshot.actions[1];
        assert!(event.payload.is_null());
        assert_eq!(event.headers["X-Client"], "web");
        assert_eq!(snapshot.saved_at, event.enqueued_at);

        // Re-saving upgrades to the current format.
        let upgraded = QueueSnapshot::new(snapshot.actions.clone(), snapshot.saved_at);
        let reloaded = QueueSnapshot::from_json(&upgraded.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.version, SNAPSHOT_VERSION);
        assert_eq!(reloaded.actions, snapshot.actions);
    }

    #[test]
    fn test_array_of_current_records_is_rejected() {
        let raw = serde_json::to_string(&sample().actions).unwrap();
        let err = QueueSnapshot::from_json(&raw).unwrap_err();
        assert!(matches!(err, CoreError::SnapshotDecode(_)));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let raw = json!({"version": 99, "savedAt": Utc::now(), "actions": []}).to_string();
        let err = QueueSnapshot::from_json(&raw).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsupportedSnapshotVersion { found: 99, .. }
        ));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = QueueSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, CoreError::SnapshotDecode(_)));

        let err = QueueSnapshot::from_json(r#"{"actions": "nope"}"#).unwrap_err();
        assert!(matches!(err, CoreError::SnapshotDecode(_)));
    }
}
