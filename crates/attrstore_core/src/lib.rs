//! # attrstore core
//!
//! A persistent attribute store keyed by `(document, element id, attribute)`.
//!
//! This crate provides:
//! - An order-preserving key scheme over the three-part identity
//! - [`AttrStore`] with get/set/has/remove and document removal
//! - Sorted, forward-only [`StoreIterator`]s over documents, ids and attributes
//! - Import of legacy JSON attribute files
//!
//! ```rust
//! use attrstore_core::AttrStore;
//!
//! let store = AttrStore::open_in_memory();
//! store.set("chrome://app", "sidebar", "width", "240").unwrap();
//! assert_eq!(store.get("chrome://app", "sidebar", "width").unwrap().as_deref(), Some("240"));
//!
//! let ids: Vec<String> = store.ids("chrome://app").unwrap().collect();
//! assert_eq!(ids, vec!["sidebar".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod dir;
mod error;
mod iter;
mod key;
mod migration;
mod store;

pub use codec::{decode_value, encode_value};
pub use config::StoreConfig;
pub use dir::StoreDir;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use iter::{Component, StoreIterator};
pub use key::{document_prefix, id_prefix, StoreKey};
pub use migration::{import_json, LegacyData};
pub use store::{AttrStore, StoreEntry, VerifyReport};

pub use attrstore_engine::{FileEngine, InMemoryEngine, KvEngine, WriteBatch};
