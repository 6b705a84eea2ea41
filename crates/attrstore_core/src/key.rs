//! Order-preserving encoding of `(document, id, attribute)` keys.
//!
//! Each component is written as its UTF-8 bytes with every `0x00` escaped
//! to `0x00 0xFF`, followed by the terminator `0x00 0x01`:
//!
//! ```text
//! "ab"      -> 61 62 00 01
//! "a\0b"    -> 61 00 FF 62 00 01
//! ```
//!
//! The terminator sorts below every other byte that can follow a component's
//! content, so comparing encoded keys byte-wise orders them by document,
//! then id, then attribute. Every component is self-delimiting, which makes
//! the encoding injective and keeps one key from being a prefix of another.

use crate::error::{StoreError, StoreResult};

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// The full identity of one stored attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    /// Document the element lives in (usually its URI).
    pub document: String,
    /// Element identifier inside the document.
    pub id: String,
    /// Attribute name on the element.
    pub attribute: String,
}

impl StoreKey {
    /// Creates a key from its parts.
    pub fn new(
        document: impl Into<String>,
        id: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            id: id.into(),
            attribute: attribute.into(),
        }
    }

    /// Encodes the key into its byte form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode_parts(&[&self.document, &self.id, &self.attribute])
    }

    /// Decodes a key produced by [`StoreKey::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corruption`] if the bytes are not exactly three
    /// well-formed UTF-8 components.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let mut parts = decode_parts(bytes)?;
        if parts.len() != 3 {
            return Err(StoreError::corruption(format!(
                "expected 3 key components, found {}",
                parts.len()
            )));
        }
        let attribute = parts.pop().unwrap_or_default();
        let id = parts.pop().unwrap_or_default();
        let document = parts.pop().unwrap_or_default();
        Ok(Self {
            document,
            id,
            attribute,
        })
    }
}

/// Returns the prefix shared by every key of `document`.
#[must_use]
pub fn document_prefix(document: &str) -> Vec<u8> {
    encode_parts(&[document])
}

/// Returns the prefix shared by every key of `(document, id)`.
#[must_use]
pub fn id_prefix(document: &str, id: &str) -> Vec<u8> {
    encode_parts(&[document, id])
}

fn encode_parts(parts: &[&str]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len() + 2).sum();
    let mut out = Vec::with_capacity(len);
    for part in parts {
        for &byte in part.as_bytes() {
            out.push(byte);
            if byte == ESCAPE {
                out.push(ESCAPED_NUL);
            }
        }
        out.push(ESCAPE);
        out.push(TERMINATOR);
    }
    out
}

fn decode_parts(bytes: &[u8]) -> StoreResult<Vec<String>> {
    let mut parts = Vec::with_capacity(3);
    let mut current = Vec::new();
    let mut iter = bytes.iter().copied();

    while let Some(byte) = iter.next() {
        if byte != ESCAPE {
            current.push(byte);
            continue;
        }
        match iter.next() {
            Some(ESCAPED_NUL) => current.push(ESCAPE),
            Some(TERMINATOR) => {
                let part = String::from_utf8(std::mem::take(&mut current)).map_err(|e| {
                    StoreError::corruption(format!("key component is not UTF-8: {e}"))
                })?;
                parts.push(part);
            }
            Some(other) => {
                return Err(StoreError::corruption(format!(
                    "invalid escape sequence 00 {other:02x} in key"
                )));
            }
            None => return Err(StoreError::corruption("key ends inside an escape")),
        }
    }

    if !current.is_empty() {
        return Err(StoreError::corruption("key has an unterminated component"));
    }
    Ok(parts)
}
