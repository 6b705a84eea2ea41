//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod entry;
pub mod migrate;
pub mod verify;

use attrstore_core::{AttrStore, StoreConfig};
use std::path::Path;

/// Opens the store at `path`, creating it only if `create` is set.
pub(crate) fn open_store(path: &Path, create: bool) -> Result<AttrStore, Box<dyn std::error::Error>> {
    let config = StoreConfig::default().create_if_missing(create);
    Ok(AttrStore::open_with_config(path, config)?)
}
