//! Error types for the message store.

use crate::types::MessageId;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Message not found: {0}")]
    NotFound(MessageId),

    #[error("Message {0} is private")]
    PrivateMessage(MessageId),

    #[error("Already shared from {source_url} (origin {origin_url}) as message {existing}")]
    DuplicateShare {
        origin_url: String,
        source_url: String,
        existing: MessageId,
    },

    #[error("Not subscribed to {0}")]
    NotSubscribed(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Transport setup failed: {0}")]
    Transport(String),

    #[error("Invalid feed from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,
}

impl StoreError {
    /// True for the conditions a feed pull skips silently.
    pub fn is_duplicate_share(&self) -> bool {
        matches!(self, StoreError::DuplicateShare { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
