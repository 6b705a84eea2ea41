//! Migrate command implementation.

use super::open_store;
use attrstore_core::import_json;
use std::fs;
use std::path::Path;

/// Imports a legacy JSON datastore into the store at `path`.
pub fn run(path: &Path, json: &Path, delete: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !json.exists() {
        return Err(format!("Legacy datastore not found at {:?}", json).into());
    }

    println!("Importing {:?} into {:?}", json, path);
    let store = open_store(path, true)?;
    let written = import_json(&store, json)?;
    store.flush()?;
    println!("✓ Imported {written} entries");

    if delete {
        fs::remove_file(json)?;
        println!("Removed {:?}", json);
    }
    Ok(())
}
