//! File-based engine for persistent storage.

use crate::engine::{BatchOp, CursorTracker, EngineCursor, KvEngine, WriteBatch};
use crate::error::{EngineError, EngineResult};
use crate::memory::scan;
use crate::record::{decode_record, encode_batch, Parsed};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Options for opening a [`FileEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Whether to `fsync` after every batch (safer but slower).
    pub sync_on_write: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}

impl FileOptions {
    /// Sets whether to sync after every batch.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

#[derive(Debug)]
struct FileState {
    /// `None` once the engine is closed.
    file: Option<File>,
    index: BTreeMap<Vec<u8>, Vec<u8>>,
    log_size: u64,
}

/// A file-backed ordered engine.
///
/// Every [`WriteBatch`] is appended to a log file as one checksummed record,
/// and the whole log is replayed into an ordered in-memory index on open.
/// Reads and scans are served from the index.
///
/// # Durability
///
/// - A batch is either fully present in the log or not at all
/// - With `sync_on_write`, `write` returns only after `File::sync_data()`
/// - A torn record at the tail (crash mid-append) is truncated on open
/// - A checksum mismatch anywhere else fails the open with `Corrupted`
///
/// # Example
///
/// ```no_run
/// use attrstore_engine::{FileEngine, KvEngine};
/// use std::path::Path;
///
/// let engine = FileEngine::open(Path::new("attrs.log")).unwrap();
/// engine.put(b"key", b"value").unwrap();
/// ```
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    options: FileOptions,
    state: RwLock<FileState>,
    cursors: CursorTracker,
}

impl FileEngine {
    /// Opens or creates a log at `path` with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the log is corrupted.
    pub fn open(path: &Path) -> EngineResult<Self> {
        Self::open_with_options(path, FileOptions::default())
    }

    /// Opens or creates a log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the log is corrupted.
    pub fn open_with_options(path: &Path, options: FileOptions) -> EngineResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let (index, valid_len) = replay(&buf)?;
        if (valid_len as usize) < buf.len() {
            warn!(
                path = %path.display(),
                valid_len,
                file_len = buf.len(),
                "truncating torn record at end of log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        debug!(path = %path.display(), keys = index.len(), "opened file engine");

        Ok(Self {
            path: path.to_path_buf(),
            options,
            state: RwLock::new(FileState {
                file: Some(file),
                index,
                log_size: valid_len,
            }),
            cursors: CursorTracker::default(),
        })
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size of the log in bytes.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.state.read().log_size
    }

    /// Rewrites the log so it holds only live entries.
    ///
    /// The compacted log is written to a temporary file, synced, and renamed
    /// over the old one, so a crash leaves either the old or the new log.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or an I/O error occurs.
    pub fn compact(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        if state.file.is_none() {
            return Err(EngineError::Closed);
        }

        let mut batch = WriteBatch::new();
        for (key, value) in &state.index {
            batch.put(key.clone(), value.clone());
        }
        let record = if batch.is_empty() {
            Vec::new()
        } else {
            encode_batch(&batch)?
        };

        let temp_path = self.path.with_extension("compact");
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&record)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let before = state.log_size;
        state.file = Some(file);
        state.log_size = record.len() as u64;
        debug!(before, after = state.log_size, "compacted log");
        Ok(())
    }

    /// Closes the engine. Later operations fail with [`EngineError::Closed`].
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        if let Some(file) = state.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Replays a log buffer, returning the index and the length of the valid prefix.
fn replay(buf: &[u8]) -> EngineResult<(BTreeMap<Vec<u8>, Vec<u8>>, u64)> {
    let mut index = BTreeMap::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        match decode_record(&buf[pos..], pos as u64)? {
            Parsed::Record(batch, used) => {
                apply(&mut index, &batch);
                pos += used;
            }
            Parsed::Incomplete => break,
        }
    }

    Ok((index, pos as u64))
}

fn apply(index: &mut BTreeMap<Vec<u8>, Vec<u8>>, batch: &WriteBatch) {
    for op in batch.ops() {
        match op {
            BatchOp::Put { key, value } => {
                index.insert(key.clone(), value.clone());
            }
            BatchOp::Delete { key } => {
                index.remove(key);
            }
        }
    }
}

impl KvEngine for FileEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let state = self.state.read();
        if state.file.is_none() {
            return Err(EngineError::Closed);
        }
        Ok(state.index.get(key).cloned())
    }

    fn write(&self, batch: &WriteBatch) -> EngineResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let record = encode_batch(batch)?;

        let mut state = self.state.write();
        let log_size = state.log_size;
        let file = state.file.as_mut().ok_or(EngineError::Closed)?;

        let appended = (|| -> EngineResult<()> {
            file.seek(SeekFrom::Start(log_size))?;
            file.write_all(&record)?;
            if self.options.sync_on_write {
                file.sync_data()?;
            } else {
                file.flush()?;
            }
            Ok(())
        })();

        if let Err(err) = appended {
            // Drop whatever part of the record made it out.
            if let Err(trunc_err) = file.set_len(log_size) {
                warn!(error = %trunc_err, "failed to roll back partial log record");
            }
            return Err(err);
        }

        state.log_size += record.len() as u64;
        apply(&mut state.index, batch);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> EngineResult<EngineCursor> {
        let state = self.state.read();
        if state.file.is_none() {
            return Err(EngineError::Closed);
        }
        Ok(EngineCursor::new(
            scan(&state.index, prefix),
            self.cursors.lease(),
        ))
    }

    fn flush(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        let file = state.file.as_mut().ok_or(EngineError::Closed)?;
        file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> EngineResult<usize> {
        let state = self.state.read();
        if state.file.is_none() {
            return Err(EngineError::Closed);
        }
        Ok(state.index.len())
    }

    fn open_cursors(&self) -> usize {
        self.cursors.open()
    }
}
