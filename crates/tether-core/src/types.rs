//! # Domain Types
//!
//! Core domain types shared by every layer of the queue.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────┐   ┌─────────────────┐   │
//! │  │   ActionRecord      │   │    Priority     │   │      Verb       │   │
//! │  │  ─────────────────  │   │  ─────────────  │   │  ─────────────  │   │
//! │  │  id (ActionId)      │   │  Critical       │   │  GET / POST     │   │
//! │  │  kind, payload      │   │  High           │   │  PUT / PATCH    │   │
//! │  │  target, verb       │   │  Medium         │   │  DELETE         │   │
//! │  │  headers            │   │  Low            │   └─────────────────┘   │
//! │  │  enqueued_at        │   └─────────────────┘                         │
//! │  │  retry_count        │                                                │
//! │  │  max_retries        │   ┌─────────────────────────────────────┐     │
//! │  │  priority           │   │  SyncResult                         │     │
//! │  └─────────────────────┘   │  successful / failed / total / errs │     │
//! │                            └─────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! A record is created on enqueue, stays read-only until a drain attempts it,
//! gets its `retry_count` bumped on each retriable failure, and leaves the
//! queue on success or once `retry_count` would exceed `max_retries`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// =============================================================================
// Action Id
// =============================================================================

/// Opaque identifier of a queued action.
///
/// Format: `action_{unix_millis}_{uuid}`. Only uniqueness within one store is
/// relied upon; the embedded time is for humans reading logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Generates a fresh id stamped with `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        ActionId(format!(
            "action_{}_{}",
            now.timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        ActionId(value)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        ActionId(value.to_string())
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Execution priority bucket of an action.
///
/// Declaration order is the display order (`Critical` first). Drain order is
/// decided by [`Priority::rank`], where `High` and `Medium` share a wave.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Must go out before anything else.
    Critical,
    /// User-visible work such as content saves.
    High,
    /// Default bucket.
    #[default]
    Medium,
    /// Best-effort work such as analytics.
    Low,
}

impl Priority {
    /// All buckets, highest first.
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Drain wave of this bucket. `High` and `Medium` run in the same wave.
    pub const fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High | Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Lowercase name, as persisted.
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(CoreError::UnknownPriority(other.to_string())),
        }
    }
}

// =============================================================================
// Verb
// =============================================================================

/// Request method used when replaying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Uppercase method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            other => Err(CoreError::UnknownVerb(other.to_string())),
        }
    }
}

// =============================================================================
// Action Record
// =============================================================================

/// One deferred unit of work awaiting execution against a remote destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// Unique within the store.
    pub id: ActionId,

    /// Semantic tag ("save_content", "analytics_event", ...). Used for
    /// grouping in logs and stats, never for dispatch.
    pub kind: String,

    /// Opaque body. JSON `null` means "send no body".
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Endpoint path or absolute URL.
    pub target: String,

    /// Request method.
    pub verb: Verb,

    /// Extra headers merged into the outbound call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Creation time; non-decreasing across a store.
    pub enqueued_at: DateTime<Utc>,

    /// Retriable failures so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Retriable failures tolerated before the record is dropped.
    pub max_retries: u32,

    /// Priority bucket.
    #[serde(default)]
    pub priority: Priority,
}

impl ActionRecord {
    /// Returns true if one more retriable failure would drop this record.
    pub fn is_last_attempt(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

// =============================================================================
// Sync Result
// =============================================================================

/// Summary of one drain pass.
///
/// `total` counts records attempted in the pass, so
/// `total == successful + failed` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Records delivered and removed.
    pub successful: usize,

    /// Attempts that failed (retained for retry or dropped).
    pub failed: usize,

    /// Records attempted in the pass.
    pub total: usize,

    /// One line per record dropped during the pass.
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Result returned when no pass ran (busy or nothing to do).
    pub fn empty() -> Self {
        SyncResult::default()
    }

    /// Returns true if nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
