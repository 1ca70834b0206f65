//! # Error Types
//!
//! Domain-specific error types for tether-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tether-core errors (this file)                                        │
//! │  └── CoreError        - Parsing and snapshot decoding failures         │
//! │                                                                         │
//! │  tether-store errors (separate crate)                                  │
//! │  └── StoreError       - Persistence failures                           │
//! │                                                                         │
//! │  tether-sync errors (separate crate)                                   │
//! │  └── SyncError        - Transport, config and engine failures          │
//! │                                                                         │
//! │  Flow: CoreError → StoreError → logged by the engine, never surfaced   │
//! │        to a producer's call site                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by the pure data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Priority text did not name one of the four buckets.
    #[error("Unknown priority '{0}'. Valid options: critical, high, medium, low")]
    UnknownPriority(String),

    /// Request method text is not supported.
    #[error("Unknown verb '{0}'. Valid options: GET, POST, PUT, PATCH, DELETE")]
    UnknownVerb(String),

    /// The persisted snapshot could not be decoded.
    ///
    /// ## When This Occurs
    /// - Storage was hand-edited or truncated mid-write
    /// - A record is missing a required field
    #[error("Snapshot decode failed: {0}")]
    SnapshotDecode(String),

    /// The persisted snapshot was written by a newer schema.
    #[error("Unsupported snapshot version {found} (newest supported: {supported})")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },

    /// Snapshot could not be serialized.
    #[error("Snapshot encode failed: {0}")]
    SnapshotEncode(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnsupportedSnapshotVersion {
            found: 9,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported snapshot version 9 (newest supported: 1)"
        );

        let err = CoreError::UnknownPriority("urgent".to_string());
        assert!(err.to_string().contains("urgent"));
    }
}
