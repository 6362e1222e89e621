//! Error types for mindqueue

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the task and memory stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced task or memory id is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad caller input (merge with too few ids, malformed filter values, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Collection document could not be read or written
    #[error("Storage error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Classify this error for structured failure outcomes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) | StoreError::Configuration(_) => {
                ErrorKind::InvalidArgument
            }
            StoreError::StorageIo(_) | StoreError::Serialization(_) | StoreError::Other(_) => {
                ErrorKind::StorageIo
            }
        }
    }

    pub(crate) fn task_not_found(id: &str) -> Self {
        StoreError::NotFound(format!("Task {} not found", id))
    }

    pub(crate) fn memory_not_found(id: &str) -> Self {
        StoreError::NotFound(format!("Memory {} not found", id))
    }
}

/// Failure taxonomy reported to tool callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    StorageIo,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            ErrorKind::StorageIo => write!(f, "storage_io"),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
