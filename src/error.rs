//! Error types for the relay and its stores.

use thiserror::Error;

/// Main error type for relay and store operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stale version for {key}: {version} (stored version is {current})")]
    StaleVersion { key: String, version: u64, current: u64 },

    #[error("Flag key {flag_key} does not match the key it is stored under ({key})")]
    KeyMismatch { key: String, flag_key: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    /// Failure reported by an external store adapter.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RelayError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RelayError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RelayError::Deserialization(e.to_string())
    }
}

/// Result type for relay and store operations.
pub type Result<T> = std::result::Result<T, RelayError>;
