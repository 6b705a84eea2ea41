//! Error types for engine operations.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside a backing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine's on-disk data is corrupted.
    #[error("engine corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the damaged record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,
}

impl EngineError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
