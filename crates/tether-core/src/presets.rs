//! # Action Presets
//!
//! The `NewAction` builder producers fill in before enqueueing, plus the
//! presets for the three action kinds the application emits most.
//!
//! ## Preset Defaults
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind             │ priority │ max_retries │ target                     │
//! │  ─────────────────┼──────────┼─────────────┼─────────────────────────── │
//! │  save_content     │ high     │ 5           │ PUT  /api/content/{id}     │
//! │                   │          │             │ POST /api/content          │
//! │  analytics_event  │ low      │ 2           │ POST /api/analytics/events │
//! │  user_action      │ medium   │ 3           │ POST /api/user/actions     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::types::{ActionId, ActionRecord, Priority, Verb};
use crate::DEFAULT_MAX_RETRIES;

/// Well-known action kinds.
pub mod kinds {
    pub const SAVE_CONTENT: &str = "save_content";
    pub const ANALYTICS_EVENT: &str = "analytics_event";
    pub const USER_ACTION: &str = "user_action";
}

/// An action a producer wants queued, before it is given an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    pub kind: String,
    pub payload: Value,
    pub target: String,
    pub verb: Verb,
    pub headers: BTreeMap<String, String>,
    pub priority: Priority,
    pub max_retries: u32,
}

impl NewAction {
    /// Starts an action with medium priority, no body and the default retry ceiling.
    pub fn new(kind: impl Into<String>, target: impl Into<String>, verb: Verb) -> Self {
        NewAction {
            kind: kind.into(),
            payload: Value::Null,
            target: target.into(),
            verb,
            headers: BTreeMap::new(),
            priority: Priority::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the request body.
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Adds one header to merge into the outbound call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces all extra headers.
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the priority bucket.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the retry ceiling.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Content save. Updates in place when `content_id` is known, creates otherwise.
    pub fn content_save(content: Value, content_id: Option<&str>) -> Self {
        let (target, verb) = match content_id {
            Some(id) => (format!("/api/content/{id}"), Verb::Put),
            None => ("/api/content".to_string(), Verb::Post),
        };

        NewAction::new(kinds::SAVE_CONTENT, target, verb)
            .payload(json!({ "content": content, "contentId": content_id }))
            .priority(Priority::High)
            .max_retries(5)
    }

    /// Analytics event. Cheap to lose, so few retries and last in line.
    pub fn analytics_event(event: Value) -> Self {
        NewAction::new(kinds::ANALYTICS_EVENT, "/api/analytics/events", Verb::Post)
            .payload(event)
            .priority(Priority::Low)
            .max_retries(2)
    }

    /// Generic user action.
    pub fn user_action(action: Value) -> Self {
        NewAction::new(kinds::USER_ACTION, "/api/user/actions", Verb::Post)
            .payload(action)
            .priority(Priority::Medium)
            .max_retries(3)
    }

    /// Materializes the record with a fresh id.
    pub fn into_record(self, now: DateTime<Utc>) -> ActionRecord {
        ActionRecord {
            id: ActionId::generate(now),
            kind: self.kind,
            payload: self.payload,
            target: self.target,
            verb: self.verb,
            headers: self.headers,
            enqueued_at: now,
            retry_count: 0,
            max_retries: self.max_retries,
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_save_with_id_updates() {
        let action = NewAction::content_save(json!({"title": "Draft"}), Some("42"));
        assert_eq!(action.kind, kinds::SAVE_CONTENT);
        assert_eq!(action.target, "/api/content/42");
        assert_eq!(action.verb, Verb::Put);
        assert_eq!(action.priority, Priority::High);
        assert_eq!(action.max_retries, 5);
        assert_eq!(action.payload["contentId"], "42");
    }

    #[test]
    fn test_content_save_without_id_creates() {
        let action = NewAction::content_save(json!({"title": "New"}), None);
        assert_eq!(action.target, "/api/content");
        assert_eq!(action.verb, Verb::Post);
        assert!(action.payload["contentId"].is_null());
    }

    #[test]
    fn test_analytics_and_user_action_defaults() {
        let analytics = NewAction::analytics_event(json!({"name": "open"}));
        assert_eq!(analytics.priority, Priority::Low);
        assert_eq!(analytics.max_retries, 2);

        let user = NewAction::user_action(json!({"button": "share"}));
        assert_eq!(user.priority, Priority::Medium);
        assert_eq!(user.max_retries, 3);
    }

    #[test]
    fn test_into_record_starts_fresh() {
        let now = Utc::now();
        let record = NewAction::new("custom", "https://example.com/hook", Verb::Post)
            .header("X-Trace", "abc")
            .into_record(now);

        assert_eq!(record.retry_count, 0);
        assert_eq!(record.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(record.enqueued_at, now);
        assert_eq!(record.headers.get("X-Trace").map(String::as_str), Some("abc"));
    }
}
