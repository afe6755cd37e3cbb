//! Session store error types

use thiserror::Error;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for storage
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A lock guarding the storage was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Errors raised by the session store
#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller tried to set a session without the required tokens
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Standard result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
