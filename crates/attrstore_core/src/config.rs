//! Store configuration.

use std::path::PathBuf;

/// Longest element id or attribute name accepted by default.
pub const DEFAULT_MAX_NAME_LEN: usize = 512;

/// Longest value kept by default; longer values are truncated.
pub const DEFAULT_MAX_VALUE_LEN: usize = 4096;

/// Configuration for opening an attribute store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Maximum length, in UTF-16 code units, of an element id or attribute name.
    pub max_name_len: usize,

    /// Maximum length, in UTF-16 code units, of a stored value.
    pub max_value_len: usize,

    /// Whether to sync the log on every write (safer but slower).
    pub sync_on_write: bool,

    /// Legacy JSON file to import on open. It is deleted once imported.
    pub legacy_json: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            sync_on_write: true,
            legacy_json: None,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the maximum id and attribute name length.
    #[must_use]
    pub const fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Sets the maximum value length.
    #[must_use]
    pub const fn max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }

    /// Sets whether to sync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets a legacy JSON file to import on open.
    #[must_use]
    pub fn legacy_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_json = Some(path.into());
        self
    }
}
