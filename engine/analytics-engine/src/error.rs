//! Error types for the analytics engine

use event_store::StoreError;
use thiserror::Error;

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors surfaced to callers of the analytics engine.
///
/// Malformed payloads are not represented here: they are recovered during
/// ingestion and never reach the caller.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Request rejected before anything was written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Underlying persistence unavailable
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl AnalyticsError {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller is at fault (4xx) rather than the server (5xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
