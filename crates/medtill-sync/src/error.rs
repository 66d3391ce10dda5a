//! # Sync Error Types
//!
//! Error types for the offline sale queue.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Submission          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Rejected (4xx)         │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  Domain (pre-flight)    │ │
//! │  │  InvalidUrl     │  │  Unavailable    │  │  Serialization          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Retryable:     Transport errors, transient database errors            │
//! │  Deterministic: everything else (never queued, never retried)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use medtill_core::CoreError;
use medtill_db::DbError;
use thiserror::Error;

/// Result type alias for queue operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure of the offline queue.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid queue configuration.
    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
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
    /// Could not reach the server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time; the outcome is unknown.
    #[error("Request timed out")]
    Timeout,

    /// The server answered 502, 503, 504, 429 or a `TRANSIENT` error body.
    #[error("Server unavailable ({status}): {message}")]
    ServerUnavailable { status: u16, message: String },

    // =========================================================================
    // Submission Errors
    // =========================================================================
    /// The server refused the sale. Replaying it produces the same answer.
    #[error("Sale rejected ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
        shortfall_cents: Option<i64>,
    },

    /// The sale failed a business rule before leaving the device.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Serializing or parsing a payload failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Local queue storage failed.
    #[error("Queue storage error: {0}")]
    Database(DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        // Business-rule failures keep their domain identity so callers
        // can tell "session closed" from a broken disk.
        match err {
            DbError::Domain(core) => SyncError::Domain(core),
            other => SyncError::Database(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if let Some(status) = err.status() {
            SyncError::ServerUnavailable {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // Connect, request and body errors all leave the outcome unknown
            SyncError::ConnectionFailed(err.to_string())
        }
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

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the operation may succeed when repeated unchanged.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 502/503/504/429 responses and `TRANSIENT` bodies
    /// - Busy/unavailable local storage
    ///
    /// ## Non-Retryable Errors
    /// - Rejections (validation, conflict, insufficient payment, not found,
    ///   500 `INTERNAL`)
    /// - Configuration errors
    /// - Corrupt payloads
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_)
            | SyncError::Timeout
            | SyncError::ServerUnavailable { .. } => true,
            SyncError::Database(db) => db.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true when the server (or local committer) reported that
    /// the session no longer accepts sales.
    pub fn is_session_closed(&self) -> bool {
        match self {
            SyncError::Domain(CoreError::SessionClosed { .. }) => true,
            SyncError::Rejected { code, message, .. } => {
                code == "CONFLICT" && message.contains("Session closed")
            }
            _ => false,
        }
    }
}
