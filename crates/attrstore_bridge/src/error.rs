//! Error types for the persistence bridge.

use crate::document::NodeId;
use attrstore_core::StoreError;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while syncing a document with the store.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The document is not privileged; persistence is disabled for it.
    #[error("document is not privileged")]
    PermissionDenied,

    /// The bridge has dropped its document reference.
    #[error("bridge is detached from its document")]
    Detached,

    /// The element was removed from the document.
    #[error("element {0:?} no longer exists")]
    NoSuchElement(NodeId),

    /// The element carries no id, so it has no store key.
    #[error("element {0:?} has no id")]
    MissingId(NodeId),
}

impl BridgeError {
    /// Returns true for the outcomes that are part of normal operation
    /// rather than failures: an unprivileged document, a detached bridge,
    /// or an element that went away or never had an id.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
