//! # attrstore bridge
//!
//! Keeps attributes of a live document in sync with an [`AttrStore`].
//!
//! - [`Document`] is a minimal element tree that reports attribute
//!   mutations to registered [`MutationObserver`]s
//! - [`TaskQueue`] runs deferred work outside of notification delivery
//! - [`PersistenceBridge`] writes eligible mutations to the store and puts
//!   stored values back on elements when a document is loaded
//!
//! ```rust
//! use attrstore_bridge::{
//!     BridgeConfig, Document, DocumentOptions, ElementKind, NamespaceId, PersistenceBridge,
//! };
//! use attrstore_core::AttrStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(AttrStore::open_in_memory());
//! let doc = Document::new(DocumentOptions::chrome("chrome://app/main.xhtml"));
//! let panel = doc.create_element(ElementKind::Generic, "vbox");
//! doc.set_attribute(panel, NamespaceId::NONE, "id", "panel", false);
//! doc.set_attribute(panel, NamespaceId::NONE, "persist", "width", false);
//!
//! let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
//! bridge.init();
//!
//! doc.set_attribute(panel, NamespaceId::NONE, "width", "300", true);
//! doc.task_queue().run_until_idle();
//! assert_eq!(store.get_value("chrome://app/main.xhtml", "panel", "width").unwrap(), "300");
//! ```
//!
//! [`AttrStore`]: attrstore_core::AttrStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod document;
mod error;
mod policy;
mod task;

pub use bridge::{PersistOutcome, PersistenceBridge, RestoreReport};
pub use document::{
    AttributeMutation, Document, DocumentOptions, ElementKind, MutationKind, MutationObserver,
    NamespaceId, NodeId, ObserverId, Principal, WindowHost,
};
pub use error::{BridgeError, BridgeResult};
pub use policy::{
    declares_persist, is_excluded_window, should_persist, BridgeConfig, TokenMatch,
    WINDOW_GEOMETRY_ATTRIBUTES,
};
pub use task::TaskQueue;
