//! Error types for the event store

use thiserror::Error;

/// Result type alias for event store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the event store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O errors (segment files, directories)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid data found on disk
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a new invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub(crate) fn not_initialized() -> Self {
        Self::invalid_operation("Event store not initialized")
    }
}
