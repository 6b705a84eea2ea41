//! Error types for the attribute store.

use attrstore_engine::EngineError;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backing engine or the file system failed.
    StorageFailure,
    /// Stored bytes could not be decoded.
    Corruption,
    /// The caller passed something the store refuses.
    InvalidArgument,
    /// The store cannot be used right now.
    Unavailable,
}

/// Errors that can occur in attribute store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing engine error.
    #[error("storage error: {0}")]
    Storage(#[from] EngineError),

    /// I/O error outside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored key or value could not be decoded.
    #[error("corrupt entry: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// An element id or attribute name exceeds the configured limit.
    #[error("{what} is {len} characters long, limit is {max}")]
    NameTooLong {
        /// Which component was too long.
        what: &'static str,
        /// Actual length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// `get_next` was called on an iterator with nothing left.
    #[error("iteration finished")]
    IterationFinished,

    /// Legacy JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store directory or an input file has the wrong shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Io(_) => ErrorKind::StorageFailure,
            Self::Corruption { .. } | Self::Json(_) => ErrorKind::Corruption,
            Self::NameTooLong { .. } | Self::IterationFinished | Self::InvalidFormat { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Locked => ErrorKind::Unavailable,
        }
    }
}
