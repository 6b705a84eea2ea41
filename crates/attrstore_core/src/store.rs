//! The attribute store.

use crate::codec::{decode_value, encode_value};
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::iter::{Component, StoreIterator};
use crate::key::{document_prefix, id_prefix, StoreKey};
use crate::migration;
use attrstore_engine::{FileEngine, FileOptions, InMemoryEngine, KvEngine, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One decoded `(key, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// The entry's identity.
    pub key: StoreKey,
    /// The stored value.
    pub value: String,
}

/// Outcome of a full-store integrity scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of entries that decoded cleanly.
    pub valid: usize,
    /// Description of every entry that did not.
    pub corrupt: Vec<String>,
}

impl VerifyReport {
    /// Returns true if no corrupt entry was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// Persistent string attributes keyed by `(document, id, attribute)`.
///
/// The store encodes keys so that the engine's byte order is the order of
/// document, then id, then attribute, and lists ids and attributes with
/// prefix scans. It adds no locking of its own: every operation is one
/// engine call, and the engine serializes concurrent writers, so the last
/// writer to a key wins.
///
/// `AttrStore` is `Send + Sync` and is meant to be shared (behind an `Arc`)
/// by every document that persists attributes.
///
/// # Example
///
/// ```rust
/// use attrstore_core::AttrStore;
///
/// let store = AttrStore::open_in_memory();
/// store.set("doc", "toolbar", "collapsed", "true").unwrap();
/// assert!(store.has("doc", "toolbar", "collapsed").unwrap());
///
/// store.remove("doc", "toolbar", "collapsed").unwrap();
/// assert_eq!(store.get("doc", "toolbar", "collapsed").unwrap(), None);
/// ```
pub struct AttrStore {
    engine: Arc<dyn KvEngine>,
    /// Set when the store owns an on-disk log, for compaction.
    file: Option<Arc<FileEngine>>,
    config: StoreConfig,
    /// Held for the directory lock. None for in-memory stores.
    _dir: Option<StoreDir>,
}

impl std::fmt::Debug for AttrStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrStore")
            .field("config", &self.config)
            .field("on_disk", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

impl AttrStore {
    /// Opens a store directory with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another process, the
    /// log is corrupted, or an I/O error occurs.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store directory.
    ///
    /// If `config.legacy_json` names an existing file it is imported and then
    /// deleted. A failed import is logged and does not fail the open.
    ///
    /// # Errors
    ///
    /// Same as [`AttrStore::open`].
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let options = FileOptions::default().sync_on_write(config.sync_on_write);
        let file = Arc::new(FileEngine::open_with_options(&dir.log_path(), options)?);
        debug!(path = %path.display(), "opened attribute store");

        let store = Self {
            engine: file.clone(),
            file: Some(file),
            config,
            _dir: Some(dir),
        };

        if let Some(legacy) = store.config.legacy_json.clone() {
            migration::migrate_legacy_file(&store, &legacy);
        }

        Ok(store)
    }

    /// Creates an empty store that lives in memory.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::with_engine(Arc::new(InMemoryEngine::new()), StoreConfig::default())
    }

    /// Creates a store on top of any engine.
    #[must_use]
    pub fn with_engine(engine: Arc<dyn KvEngine>, config: StoreConfig) -> Self {
        Self {
            engine,
            file: None,
            config,
            _dir: None,
        }
    }

    /// Returns the backing engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the stored value, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails and `Corruption` if the stored
    /// bytes do not decode.
    pub fn get(&self, document: &str, id: &str, attribute: &str) -> StoreResult<Option<String>> {
        debug!(document, id, attribute, "get value");
        let key = StoreKey::new(document, id, attribute).encode();
        match self.engine.get(&key)? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the stored value, or an empty string if the key is absent.
    ///
    /// # Errors
    ///
    /// Same as [`AttrStore::get`].
    pub fn get_value(&self, document: &str, id: &str, attribute: &str) -> StoreResult<String> {
        Ok(self.get(document, id, attribute)?.unwrap_or_default())
    }

    /// Inserts or replaces a value.
    ///
    /// An empty `value` is stored as an empty string; it does not remove the
    /// key. Values longer than [`StoreConfig::max_value_len`] UTF-16 code
    /// units are truncated.
    ///
    /// # Errors
    ///
    /// Returns `NameTooLong` if `id` or `attribute` exceeds
    /// [`StoreConfig::max_name_len`], or `Storage` if the engine fails.
    pub fn set(&self, document: &str, id: &str, attribute: &str, value: &str) -> StoreResult<()> {
        debug!(document, id, attribute, value, "set value");
        self.check_names(id, attribute)?;
        let value = self.clamp_value(value);
        let key = StoreKey::new(document, id, attribute).encode();
        self.engine.put(&key, &encode_value(value)?)?;
        Ok(())
    }

    /// Returns true if a value is stored for the key.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn has(&self, document: &str, id: &str, attribute: &str) -> StoreResult<bool> {
        debug!(document, id, attribute, "has value");
        let key = StoreKey::new(document, id, attribute).encode();
        Ok(self.engine.get(&key)?.is_some())
    }

    /// Removes a value. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn remove(&self, document: &str, id: &str, attribute: &str) -> StoreResult<()> {
        debug!(document, id, attribute, "remove value");
        let key = StoreKey::new(document, id, attribute).encode();
        self.engine.delete(&key)?;
        Ok(())
    }

    /// Removes every value stored under `document` in one atomic batch.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails; nothing is removed then.
    pub fn remove_document(&self, document: &str) -> StoreResult<usize> {
        debug!(document, "remove document");
        let mut batch = WriteBatch::new();
        for (key, _) in self.engine.scan_prefix(&document_prefix(document))? {
            batch.delete(key);
        }
        let removed = batch.len();
        self.engine.write(&batch)?;
        Ok(removed)
    }

    /// Applies a raw batch atomically.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails; nothing is applied then.
    pub fn apply(&self, batch: &WriteBatch) -> StoreResult<()> {
        debug!(ops = batch.len(), "apply batch");
        self.engine.write(batch)?;
        Ok(())
    }

    /// Lists every document with at least one stored value, ascending.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn documents(&self) -> StoreResult<StoreIterator> {
        let cursor = self.engine.scan_prefix(&[])?;
        Ok(StoreIterator::new(cursor, Component::Document))
    }

    /// Lists the distinct ids with stored values in `document`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn ids(&self, document: &str) -> StoreResult<StoreIterator> {
        debug!(document, "get ids");
        let cursor = self.engine.scan_prefix(&document_prefix(document))?;
        Ok(StoreIterator::new(cursor, Component::Id))
    }

    /// Lists the attributes stored for `(document, id)`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn attributes(&self, document: &str, id: &str) -> StoreResult<StoreIterator> {
        debug!(document, id, "get attributes");
        let cursor = self.engine.scan_prefix(&id_prefix(document, id))?;
        Ok(StoreIterator::new(cursor, Component::Attribute))
    }

    /// Returns every decodable entry of `document` in key order.
    ///
    /// Entries whose key or value does not decode are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn entries(&self, document: &str) -> StoreResult<Vec<StoreEntry>> {
        let mut entries = Vec::new();
        for (key, value) in self.engine.scan_prefix(&document_prefix(document))? {
            match decode_entry(&key, &value) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(document, error = %err, "skipping corrupt entry"),
            }
        }
        Ok(entries)
    }

    /// Decodes every key and value in the store.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn verify(&self) -> StoreResult<VerifyReport> {
        let mut report = VerifyReport::default();
        for (key, value) in self.engine.scan_prefix(&[])? {
            match decode_entry(&key, &value) {
                Ok(_) => report.valid += 1,
                Err(err) => report.corrupt.push(format!("{}: {err}", escape_bytes(&key))),
            }
        }
        Ok(report)
    }

    /// Makes every previous write durable.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn flush(&self) -> StoreResult<()> {
        self.engine.flush()?;
        Ok(())
    }

    /// Returns the size of the on-disk log, or `None` for stores without one.
    #[must_use]
    pub fn log_size(&self) -> Option<u64> {
        self.file.as_ref().map(|file| file.log_size())
    }

    /// Compacts the on-disk log. Returns false for stores without one.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the engine fails.
    pub fn compact(&self) -> StoreResult<bool> {
        match &self.file {
            Some(file) => {
                file.compact()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn check_names(&self, id: &str, attribute: &str) -> StoreResult<()> {
        let max = self.config.max_name_len;
        for (what, name) in [("id", id), ("attribute", attribute)] {
            let len = utf16_len(name);
            if len > max {
                return Err(StoreError::NameTooLong { what, len, max });
            }
        }
        Ok(())
    }

    /// Cuts `value` to at most `max_value_len` UTF-16 code units without
    /// splitting a character.
    pub(crate) fn clamp_value<'a>(&self, value: &'a str) -> &'a str {
        let max = self.config.max_value_len;
        let mut units = 0;
        for (index, ch) in value.char_indices() {
            units += ch.len_utf16();
            if units > max {
                warn!(len = utf16_len(value), max, "truncating long attribute value");
                return &value[..index];
            }
        }
        value
    }
}

/// Lengths are measured in UTF-16 code units, as by the legacy datastore.
fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn decode_entry(key: &[u8], value: &[u8]) -> StoreResult<StoreEntry> {
    Ok(StoreEntry {
        key: StoreKey::decode(key)?,
        value: decode_value(value)?,
    })
}

fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
