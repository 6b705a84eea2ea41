//! Single-entry commands: get, set, remove and remove-document.

use super::open_store;
use std::path::Path;

/// Prints one value. Fails if the key is absent.
pub fn get(path: &Path, document: &str, id: &str, attribute: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, false)?;
    match store.get(document, id, attribute)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => Err(format!("No value for {document} {id} {attribute}").into()),
    }
}

/// Stores one value, creating the store if needed.
pub fn set(
    path: &Path,
    document: &str,
    id: &str,
    attribute: &str,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, true)?;
    store.set(document, id, attribute, value)?;
    store.flush()?;
    Ok(())
}

/// Removes one value.
pub fn remove(path: &Path, document: &str, id: &str, attribute: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, false)?;
    store.remove(document, id, attribute)?;
    store.flush()?;
    Ok(())
}

/// Removes every value of a document.
pub fn remove_document(path: &Path, document: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, false)?;
    let removed = store.remove_document(document)?;
    store.flush()?;
    println!("Removed {removed} entries from {document}");
    Ok(())
}
