//! # attrstore engine
//!
//! Ordered, durable key-value engines that back the attribute store.
//!
//! Engines are **opaque ordered byte stores** - they do not interpret the
//! keys or values they hold. The attribute store owns the key scheme and
//! the value encoding.
//!
//! ## Design Principles
//!
//! - Point `get`, atomic batched writes, ascending prefix scans
//! - Scans hand out an owned [`EngineCursor`] over a snapshot of the range
//! - Must be `Send + Sync`; engines do their own internal locking
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - For testing and ephemeral stores
//! - [`FileEngine`] - Append-only checksummed log replayed into an ordered index
//!
//! ## Example
//!
//! ```rust
//! use attrstore_engine::{InMemoryEngine, KvEngine};
//!
//! let engine = InMemoryEngine::new();
//! engine.put(b"k", b"v").unwrap();
//! assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod file;
mod memory;
mod record;

pub use engine::{BatchOp, EngineCursor, KvEngine, KvPair, WriteBatch};
pub use error::{EngineError, EngineResult};
pub use file::{FileEngine, FileOptions};
pub use memory::InMemoryEngine;
pub use record::compute_crc32;
