//! Dump command implementation.

use super::open_store;
use crate::Format;
use attrstore_core::{AttrStore, LegacyData, StoreResult};
use std::fmt::Write;
use std::path::Path;

/// Runs the dump command.
pub fn run(path: &Path, document: Option<&str>, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, false)?;
    let data = collect(&store, document)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&data)?),
        Format::Text => print!("{}", render_text(&data)),
    }
    Ok(())
}

/// Gathers the decodable entries of one document, or of all of them.
pub(crate) fn collect(store: &AttrStore, document: Option<&str>) -> StoreResult<LegacyData> {
    let documents: Vec<String> = match document {
        Some(document) => vec![document.to_string()],
        None => store.documents()?.collect(),
    };

    let mut data = LegacyData::new();
    for document in documents {
        for entry in store.entries(&document)? {
            data.entry(entry.key.document)
                .or_default()
                .entry(entry.key.id)
                .or_default()
                .insert(entry.key.attribute, entry.value);
        }
    }
    Ok(data)
}

/// Renders one `document id attribute = "value"` line per entry.
pub(crate) fn render_text(data: &LegacyData) -> String {
    let mut out = String::new();
    for (document, ids) in data {
        for (id, attributes) in ids {
            for (attribute, value) in attributes {
                let _ = writeln!(out, "{document} {id} {attribute} = {value:?}");
            }
        }
    }
    out
}
