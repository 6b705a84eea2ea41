//! Import of legacy JSON attribute files.
//!
//! The legacy format is a single JSON object nesting documents, ids and
//! attributes:
//!
//! ```json
//! { "chrome://app/main.xhtml": { "main-window": { "sizemode": "normal" } } }
//! ```

use crate::codec::encode_value;
use crate::error::{StoreError, StoreResult};
use crate::key::StoreKey;
use crate::store::AttrStore;
use attrstore_engine::WriteBatch;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Documents to ids to attributes to values.
pub type LegacyData = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Imports a legacy JSON file into `store` as one atomic batch.
///
/// Entries whose id or attribute is too long for the store are skipped with
/// a warning; over-long values are truncated as [`AttrStore::set`] would.
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, `Json` if it does not parse,
/// or `Storage` if the batch cannot be written.
pub fn import_json(store: &AttrStore, path: &Path) -> StoreResult<usize> {
    let file = File::open(path)?;
    let data: LegacyData = serde_json::from_reader(BufReader::new(file))?;
    import_data(store, &data)
}

pub(crate) fn import_data(store: &AttrStore, data: &LegacyData) -> StoreResult<usize> {
    let mut batch = WriteBatch::new();

    for (document, ids) in data {
        for (id, attrs) in ids {
            for (attribute, value) in attrs {
                if let Err(err) = store.check_names(id, attribute) {
                    warn!(document, id, attribute, error = %err, "skipping legacy entry");
                    continue;
                }
                let key = StoreKey::new(document.as_str(), id.as_str(), attribute.as_str());
                batch.put(key.encode(), encode_value(store.clamp_value(value))?);
            }
        }
    }

    let written = batch.len();
    store.apply(&batch)?;
    Ok(written)
}

/// Imports `path` if it exists, then deletes it.
///
/// Failure to migrate isn't fatal: it is logged and the store opens with
/// whatever it already held.
pub(crate) fn migrate_legacy_file(store: &AttrStore, path: &Path) {
    if !path.exists() {
        debug!(path = %path.display(), "no legacy datastore to migrate");
        return;
    }

    let result = import_json(store, path).and_then(|written| {
        fs::remove_file(path).map_err(StoreError::from)?;
        Ok(written)
    });

    match result {
        Ok(written) => info!(path = %path.display(), written, "migrated legacy datastore"),
        Err(err) => error!(path = %path.display(), error = %err, "error migrating data"),
    }
}
