//! Error types for SealChain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// A user-submitted transaction claimed the reward-only `Genesis` identity.
    #[error("Rejected transaction: {0}")]
    RejectedTransaction(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    /// A persisted snapshot is missing fields or is structurally inconsistent.
    #[error("Malformed persisted state: {0}")]
    MalformedPersistedState(String),
    #[error("Tamper detected at block {index}: {reason}")]
    TamperDetected { index: u64, reason: String },
    #[error("Pending transaction pool is full ({0} transactions)")]
    MempoolFull(usize),
    /// An address was registered twice in the address book.
    #[error("Duplicate address: {0}")]
    DuplicateAddress(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::InvalidConfig(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
