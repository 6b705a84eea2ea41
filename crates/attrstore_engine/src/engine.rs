//! Engine trait definition and the types that cross it.

use crate::error::EngineResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A raw key/value pair as stored by an engine.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or replace the value at `key`.
    Put {
        /// Raw key bytes.
        key: Vec<u8>,
        /// Raw value bytes.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Raw key bytes.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered group of mutations applied atomically.
///
/// Operations are applied in insertion order, so a later `Put` or `Delete`
/// of the same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an upsert.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Returns the queued operations.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Returns the number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Counts cursors that are still alive for one engine.
#[derive(Debug, Clone, Default)]
pub(crate) struct CursorTracker {
    open: Arc<AtomicUsize>,
}

impl CursorTracker {
    pub(crate) fn lease(&self) -> CursorLease {
        self.open.fetch_add(1, Ordering::AcqRel);
        CursorLease {
            open: Arc::clone(&self.open),
        }
    }

    pub(crate) fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }
}

/// Held by a live cursor; gives its slot back on drop.
#[derive(Debug)]
pub(crate) struct CursorLease {
    open: Arc<AtomicUsize>,
}

impl Drop for CursorLease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An owned, forward-only cursor over a snapshot of a key range.
///
/// The snapshot is taken when the cursor is created: later writes to the
/// engine are not observed. Entries are yielded in ascending byte order of
/// their keys. The engine-side resources are released when the cursor is
/// dropped.
#[derive(Debug)]
pub struct EngineCursor {
    entries: std::vec::IntoIter<KvPair>,
    _lease: CursorLease,
}

impl EngineCursor {
    pub(crate) fn new(entries: Vec<KvPair>, lease: CursorLease) -> Self {
        Self {
            entries: entries.into_iter(),
            _lease: lease,
        }
    }

    /// Returns the number of entries not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Returns the next entry without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&KvPair> {
        self.entries.as_slice().first()
    }
}

impl Iterator for EngineCursor {
    type Item = KvPair;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// An ordered, durable key-value engine.
///
/// Keys and values are opaque byte strings. Keys are ordered by plain
/// lexicographic byte comparison.
///
/// # Invariants
///
/// - `write` applies every operation of a batch or none of them
/// - `get` after a successful `write` observes that write
/// - `scan_prefix` yields exactly the keys starting with `prefix`, ascending
/// - Engines must be `Send + Sync`; callers never hold an engine lock
///
/// # Implementors
///
/// - [`super::InMemoryEngine`] - For testing
/// - [`super::FileEngine`] - For persistent storage
pub trait KvEngine: Send + Sync {
    /// Returns the value stored at `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or an I/O error occurs.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Applies a batch of writes atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be made durable. In that
    /// case none of its operations are visible.
    fn write(&self, batch: &WriteBatch) -> EngineResult<()>;

    /// Opens a cursor over every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn scan_prefix(&self, prefix: &[u8]) -> EngineResult<EngineCursor>;

    /// Makes all previous writes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> EngineResult<()>;

    /// Returns the number of live keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn len(&self) -> EngineResult<usize>;

    /// Returns the number of cursors that have not been dropped yet.
    fn open_cursors(&self) -> usize;

    /// Inserts or replaces a single key.
    ///
    /// # Errors
    ///
    /// Same as [`KvEngine::write`].
    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(&batch)
    }

    /// Removes a single key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Same as [`KvEngine::write`].
    fn delete(&self, key: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(&batch)
    }

    /// Returns true if the engine holds no keys.
    ///
    /// # Errors
    ///
    /// Same as [`KvEngine::len`].
    fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }
}
