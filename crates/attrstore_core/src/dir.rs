//! Store directory management.
//!
//! This module handles the file system layout of an attribute store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! └─ attrs.log         # Engine log
//! ```
//!
//! The LOCK file ensures only one process writes to the store at a time.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "attrs.log";

/// Holds the store directory and its exclusive lock.
///
/// Only one `StoreDir` can exist per directory at a time; the lock is
/// released when it is dropped.
///
/// # Example
///
/// ```rust,ignore
/// use attrstore_core::StoreDir;
/// use std::path::Path;
///
/// let dir = StoreDir::open(Path::new("xulstore"), true)?;
/// println!("log path: {:?}", dir.log_path());
/// ```
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the engine log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Checks if the directory holds no store yet.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.log_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");
        assert!(!store_path.exists());

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert!(dir.is_new_store());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("nonexistent"), false);
        assert!(matches!(result, Err(StoreError::InvalidFormat { .. })));
    }

    #[test]
    fn open_rejects_plain_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file");
        fs::write(&file_path, b"x").unwrap();
        assert!(StoreDir::open(&file_path, true).is_err());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked");

        let _dir1 = StoreDir::open(&store_path, true).unwrap();
        let result = StoreDir::open(&store_path, true);
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen");
        {
            let _dir = StoreDir::open(&store_path, true).unwrap();
        }
        let _dir2 = StoreDir::open(&store_path, true).unwrap();
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("paths");
        let dir = StoreDir::open(&store_path, true).unwrap();
        assert_eq!(dir.path(), store_path.as_path());
        assert_eq!(dir.log_path(), store_path.join("attrs.log"));
    }
}
