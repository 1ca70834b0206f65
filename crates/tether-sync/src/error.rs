//! # Queue Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Engine              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  ChannelError           │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  │  ConfigLoad/    │  │  ServerStatus   │  │  Storage failures are   │ │
//! │  │   SaveFailed    │  │  ClientStatus   │  │  logged by the store,   │ │
//! │  │                 │  │  InvalidTarget  │  │  never surfaced         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Retryable: ConnectionFailed, Timeout, ServerStatus                    │
//! │  Permanent: ClientStatus, InvalidTarget                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, SyncError>;

/// Error type covering configuration, transport and engine failures.
///
/// Transport variants carry enough context for the `errors` lines of a
/// drain pass; nothing here ever reaches a producer's `enqueue` call.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid queue configuration.
    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the destination.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Call did not finish within the transport timeout.
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    /// Destination answered with a 5xx-equivalent status.
    #[error("Server error {status}: {body}")]
    ServerStatus { status: u16, body: String },

    /// Destination answered with a 4xx-equivalent status.
    #[error("Client error {status}: {body}")]
    ClientStatus { status: u16, body: String },

    /// Target cannot be turned into a request.
    #[error("Invalid target '{0}'")]
    InvalidTarget(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

/// Convert reqwest errors to SyncError.
///
/// ```text
/// timeout        → SyncError::Timeout
/// connect        → SyncError::ConnectionFailed
/// builder        → SyncError::InvalidTarget
/// status (4xx)   → SyncError::ClientStatus
/// status (other) → SyncError::ServerStatus
/// other          → SyncError::ConnectionFailed
/// ```
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(0)
        } else if err.is_builder() {
            SyncError::InvalidTarget(err.to_string())
        } else if let Some(status) = err.status() {
            if status.is_client_error() {
                SyncError::ClientStatus {
                    status: status.as_u16(),
                    body: err.to_string(),
                }
            } else {
                SyncError::ServerStatus {
                    status: status.as_u16(),
                    body: err.to_string(),
                }
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt of the same call may succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures
    /// - Timeouts
    /// - 5xx-equivalent responses
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) | SyncError::ServerStatus { .. }
        )
    }

    /// Returns true if repeating the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SyncError::ClientStatus { .. } | SyncError::InvalidTarget(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Maps a non-success HTTP status to its transport error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if (400..500).contains(&status) {
            SyncError::ClientStatus { status, body }
        } else {
            SyncError::ServerStatus { status, body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());
        assert!(SyncError::from_status(503, "unavailable").is_retryable());

        assert!(!SyncError::from_status(404, "missing").is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(SyncError::from_status(422, "bad payload").is_permanent());
        assert!(SyncError::InvalidTarget("::".into()).is_permanent());
        assert!(!SyncError::from_status(500, "boom").is_permanent());
        assert!(!SyncError::Timeout(1).is_permanent());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::from_status(500, "Internal Server Error");
        assert_eq!(err.to_string(), "Server error 500: Internal Server Error");
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
    }
}
