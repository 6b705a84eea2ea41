//! In-memory engine for testing.

use crate::engine::{BatchOp, CursorTracker, EngineCursor, KvEngine, KvPair, WriteBatch};
use crate::error::EngineResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory ordered engine.
///
/// This engine keeps all data in a `BTreeMap` and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This engine is thread-safe and can be shared across threads. Batches are
/// applied under a single write lock, so readers never see half a batch.
///
/// # Example
///
/// ```rust
/// use attrstore_engine::{InMemoryEngine, KvEngine};
///
/// let engine = InMemoryEngine::new();
/// engine.put(b"b", b"2").unwrap();
/// engine.put(b"a", b"1").unwrap();
/// let keys: Vec<_> = engine.scan_prefix(b"").unwrap().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    cursors: CursorTracker,
}

impl InMemoryEngine {
    /// Creates a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine pre-populated with raw entries.
    ///
    /// Useful for testing recovery and corruption handling.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = KvPair>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
            cursors: CursorTracker::default(),
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl KvEngine for InMemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn write(&self, batch: &WriteBatch) -> EngineResult<()> {
        let mut data = self.data.write();
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> EngineResult<EngineCursor> {
        let entries = scan(&self.data.read(), prefix);
        Ok(EngineCursor::new(entries, self.cursors.lease()))
    }

    fn flush(&self) -> EngineResult<()> {
        // Nothing is buffered
        Ok(())
    }

    fn len(&self) -> EngineResult<usize> {
        Ok(self.data.read().len())
    }

    fn open_cursors(&self) -> usize {
        self.cursors.open()
    }
}

/// Copies out every entry of `map` whose key starts with `prefix`.
pub(crate) fn scan(map: &BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8]) -> Vec<KvPair> {
    map.range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
