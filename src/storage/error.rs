//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Connection to the store failed or the session died
    ConnectionFailed(String),

    /// Append was rejected by the store
    AppendFailed(String),

    /// A range or latest-N query failed
    QueryFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage sink: {}", msg)
            }
            StorageError::AppendFailed(msg) => write!(f, "storage append failed: {}", msg),
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}
