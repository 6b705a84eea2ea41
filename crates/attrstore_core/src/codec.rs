//! Stored value encoding.
//!
//! Values are written as a single CBOR text string. Anything else found in
//! the engine (another CBOR type, trailing bytes, garbage) was not written
//! by this store and is reported as corruption.

use crate::error::{StoreError, StoreResult};
use ciborium::Value;

/// Encodes an attribute value for storage.
///
/// # Errors
///
/// Returns [`StoreError::Corruption`] if the CBOR writer fails.
pub fn encode_value(value: &str) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(value.len() + 9);
    ciborium::into_writer(&value, &mut buf)
        .map_err(|e| StoreError::corruption(format!("failed to encode value: {e}")))?;
    Ok(buf)
}

/// Decodes a stored attribute value.
///
/// # Errors
///
/// Returns [`StoreError::Corruption`] if the bytes are not exactly one CBOR
/// text string.
pub fn decode_value(bytes: &[u8]) -> StoreResult<String> {
    let mut reader = bytes;
    let value: Value = ciborium::from_reader(&mut reader)
        .map_err(|e| StoreError::corruption(format!("undecodable value: {e}")))?;

    if !reader.is_empty() {
        return Err(StoreError::corruption(format!(
            "{} trailing bytes after value",
            reader.len()
        )));
    }

    match value {
        Value::Text(text) => Ok(text),
        other => Err(StoreError::corruption(format!(
            "expected a text value, found {other:?}"
        ))),
    }
}
