//! The persistence bridge between a live document and the store.

use crate::document::{AttributeMutation, Document, MutationObserver, NamespaceId, NodeId, ObserverId};
use crate::error::{BridgeError, BridgeResult};
use crate::policy::{is_excluded_window, should_persist, window_allows, BridgeConfig, ID_ATTRIBUTE};
use attrstore_core::AttrStore;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What [`PersistenceBridge::persist`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The attribute value was written.
    Stored,
    /// The attribute was empty or absent, so its entry was removed.
    Removed,
    /// The attribute is not eligible, either because the window rules
    /// reserve it or because the element no longer declares it; nothing
    /// was written.
    Excluded,
}

/// Summary of a restoration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Ids found in the store for the document.
    pub ids: usize,
    /// Attribute values set on elements.
    pub applied: usize,
    /// Entries that could not be read and were skipped: undecodable keys
    /// anywhere in the document plus values that failed to load.
    pub skipped: usize,
}

struct BridgeInner {
    document: RefCell<Weak<Document>>,
    observer: Cell<Option<ObserverId>>,
    store: Arc<AttrStore>,
    config: BridgeConfig,
}

/// Keeps the persisted attributes of one document in sync with the store.
///
/// The bridge holds a revocable reference to its document. Writes caused by
/// attribute mutations are queued on the document's [`TaskQueue`] and check
/// that reference when they run, so a write still queued after
/// [`drop_document_reference`](Self::drop_document_reference) does nothing.
///
/// Only documents with the system principal are synced. For any other
/// document every operation is a no-op.
///
/// [`TaskQueue`]: crate::TaskQueue
pub struct PersistenceBridge {
    inner: Rc<BridgeInner>,
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("attached", &self.is_attached())
            .field("subscribed", &self.inner.observer.get().is_some())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PersistenceBridge {
    /// Creates a bridge for `document`. Nothing happens until
    /// [`init`](Self::init).
    #[must_use]
    pub fn new(document: &Rc<Document>, store: Arc<AttrStore>, config: BridgeConfig) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                document: RefCell::new(Rc::downgrade(document)),
                observer: Cell::new(None),
                store,
                config,
            }),
        }
    }

    /// Restores persisted attributes, then starts watching for mutations.
    ///
    /// Restoration runs before the subscription, so values put back on
    /// elements are not written again. Failures are logged; the returned
    /// report is empty if restoration could not run at all.
    pub fn init(&self) -> RestoreReport {
        let report = match self.apply_persistent_attributes() {
            Ok(report) => report,
            Err(err) if err.is_expected() => {
                debug!(error = %err, "not restoring persisted attributes");
                return RestoreReport::default();
            }
            Err(err) => {
                error!(error = %err, "failed to restore persisted attributes");
                RestoreReport::default()
            }
        };
        self.inner.subscribe();
        report
    }

    /// Stops watching the document and forgets it.
    ///
    /// Writes still queued become no-ops. Calling this more than once is
    /// harmless.
    pub fn drop_document_reference(&self) {
        self.inner.detach();
    }

    /// Returns true while the bridge holds a live document.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.document().is_some()
    }

    /// Returns true while the bridge receives mutation notifications.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.observer.get().is_some()
    }

    /// Returns the store the bridge writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<AttrStore> {
        &self.inner.store
    }

    /// Returns the bridge configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Puts every stored value for the document back on its elements.
    ///
    /// An id may match several elements; they are updated last-found
    /// first. An entry that cannot be read is counted as skipped and the
    /// pass moves on to the next one.
    ///
    /// # Errors
    ///
    /// Returns `Detached` or `PermissionDenied` when there is nothing to
    /// restore into, and `Store` if the ids cannot be listed.
    pub fn apply_persistent_attributes(&self) -> BridgeResult<RestoreReport> {
        self.inner.apply_persistent_attributes()
    }

    /// Writes the current value of `attribute` on `element` to the store.
    ///
    /// An empty or absent value removes the entry. The element's `persist`
    /// list is not consulted here, but the window rules still apply;
    /// writes queued by mutations check both when they run.
    ///
    /// # Errors
    ///
    /// Returns `Detached`, `PermissionDenied`, `NoSuchElement` or
    /// `MissingId` when there is nothing to write, and `Store` if the
    /// store fails.
    pub fn persist(&self, element: NodeId, attribute: &str) -> BridgeResult<PersistOutcome> {
        self.inner.persist(element, attribute)
    }
}

impl Drop for PersistenceBridge {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

impl BridgeInner {
    fn document(&self) -> Option<Rc<Document>> {
        self.document.borrow().upgrade()
    }

    fn privileged_document(&self) -> BridgeResult<Rc<Document>> {
        let document = self.document().ok_or(BridgeError::Detached)?;
        if !document.is_system_principal() {
            return Err(BridgeError::PermissionDenied);
        }
        Ok(document)
    }

    fn subscribe(self: &Rc<Self>) {
        if self.observer.get().is_some() {
            return;
        }
        let Ok(document) = self.privileged_document() else {
            return;
        };
        let observer = Rc::new(BridgeObserver {
            bridge: Rc::downgrade(self),
        });
        self.observer.set(Some(document.add_observer(observer)));
        debug!(uri = document.uri(), "watching persisted attributes");
    }

    fn detach(&self) {
        let document = self.document.replace(Weak::new()).upgrade();
        if let (Some(document), Some(observer)) = (document, self.observer.take()) {
            document.remove_observer(observer);
            debug!(uri = document.uri(), "dropped document reference");
        }
    }

    fn apply_persistent_attributes(&self) -> BridgeResult<RestoreReport> {
        let document = self.privileged_document()?;
        let uri = document.uri();
        let mut report = RestoreReport::default();

        // The id scan covers every key of the document, so it sees each
        // undecodable key exactly once.
        let mut id_iter = self.store.ids(uri)?;
        let ids: Vec<String> = id_iter.by_ref().collect();
        report.ids = ids.len();
        report.skipped += id_iter.skipped();
        drop(id_iter);

        for id in &ids {
            let elements = document.get_all_elements_for_id(id);
            if elements.is_empty() {
                continue;
            }

            // Keys this scan skips were already counted by the id scan.
            let attributes: Vec<String> = match self.store.attributes(uri, id) {
                Ok(iter) => iter.collect(),
                Err(err) => {
                    warn!(uri, id = %id, error = %err, "skipping id");
                    report.skipped += 1;
                    continue;
                }
            };

            for attribute in &attributes {
                let value = match self.store.get(uri, id, attribute) {
                    Ok(Some(value)) => value,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(uri, id = %id, attribute = %attribute, error = %err, "skipping attribute");
                        report.skipped += 1;
                        continue;
                    }
                };

                for &element in elements.iter().rev() {
                    if is_excluded_window(&document, element) {
                        continue;
                    }
                    if document.set_attribute(element, NamespaceId::NONE, attribute, &value, true) {
                        report.applied += 1;
                    }
                }
            }
        }

        debug!(
            uri,
            ids = report.ids,
            applied = report.applied,
            skipped = report.skipped,
            "restored persisted attributes"
        );
        Ok(report)
    }

    fn persist(&self, element: NodeId, attribute: &str) -> BridgeResult<PersistOutcome> {
        let document = self.privileged_document()?;
        if !document.contains(element) {
            return Err(BridgeError::NoSuchElement(element));
        }
        if !window_allows(&document, element, attribute) {
            return Ok(PersistOutcome::Excluded);
        }

        let id = document
            .get_attribute(element, NamespaceId::NONE, ID_ATTRIBUTE)
            .filter(|id| !id.is_empty())
            .ok_or(BridgeError::MissingId(element))?;
        let value = document
            .get_attribute(element, NamespaceId::NONE, attribute)
            .unwrap_or_default();

        if value.is_empty() {
            self.store.remove(document.uri(), &id, attribute)?;
            Ok(PersistOutcome::Removed)
        } else {
            self.store.set(document.uri(), &id, attribute, &value)?;
            Ok(PersistOutcome::Stored)
        }
    }

    /// Runs a write queued by a mutation. The element must still declare
    /// the attribute when the write runs.
    fn persist_declared(&self, element: NodeId, attribute: &str) -> BridgeResult<PersistOutcome> {
        let document = self.privileged_document()?;
        if !document.contains(element) {
            return Err(BridgeError::NoSuchElement(element));
        }
        if !should_persist(&document, element, attribute, &self.config) {
            return Ok(PersistOutcome::Excluded);
        }
        self.persist(element, attribute)
    }

    fn attribute_changed(self: &Rc<Self>, document: &Document, mutation: &AttributeMutation) {
        if mutation.namespace != NamespaceId::NONE || !document.is_system_principal() {
            return;
        }
        if !should_persist(document, mutation.element, &mutation.attribute, &self.config) {
            return;
        }

        let bridge = Rc::downgrade(self);
        let element = mutation.element;
        let attribute = mutation.attribute.clone();
        document.task_queue().dispatch("persist", move || {
            let Some(bridge) = bridge.upgrade() else {
                return;
            };
            match bridge.persist_declared(element, &attribute) {
                Ok(outcome) => debug!(attribute = %attribute, ?outcome, "persisted attribute"),
                Err(err) if err.is_expected() => {
                    debug!(attribute = %attribute, error = %err, "dropped persist");
                }
                Err(err) => error!(attribute = %attribute, error = %err, "failed to persist attribute"),
            }
        });
    }
}

struct BridgeObserver {
    bridge: Weak<BridgeInner>,
}

impl MutationObserver for BridgeObserver {
    fn attribute_changed(&self, document: &Document, mutation: &AttributeMutation) {
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.attribute_changed(document, mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentOptions, ElementKind};

    fn setup() -> (Rc<Document>, Arc<AttrStore>, NodeId) {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let el = doc.create_element(ElementKind::Generic, "box");
        doc.set_attribute(el, NamespaceId::NONE, "id", "e", false);
        doc.set_attribute(el, NamespaceId::NONE, "persist", "x", false);
        (doc, Arc::new(AttrStore::open_in_memory()), el)
    }

    #[test]
    fn init_subscribes_once() {
        let (doc, store, _) = setup();
        let bridge = PersistenceBridge::new(&doc, store, BridgeConfig::default());
        assert!(!bridge.is_subscribed());

        bridge.init();
        bridge.init();
        assert!(bridge.is_subscribed());
        assert_eq!(doc.observer_count(), 1);
    }

    #[test]
    fn write_is_deferred() {
        let (doc, store, el) = setup();
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
        bridge.init();

        doc.set_attribute(el, NamespaceId::NONE, "x", "1", true);
        assert_eq!(doc.task_queue().pending(), 1);
        assert!(!store.has("doc", "e", "x").unwrap());

        doc.task_queue().run_until_idle();
        assert_eq!(store.get_value("doc", "e", "x").unwrap(), "1");
    }

    #[test]
    fn persist_removes_on_empty_and_absent() {
        let (doc, store, el) = setup();
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());

        doc.set_attribute(el, NamespaceId::NONE, "x", "1", false);
        assert_eq!(bridge.persist(el, "x").unwrap(), PersistOutcome::Stored);

        doc.set_attribute(el, NamespaceId::NONE, "x", "", false);
        assert_eq!(bridge.persist(el, "x").unwrap(), PersistOutcome::Removed);
        assert!(!store.has("doc", "e", "x").unwrap());

        store.set("doc", "e", "x", "stale").unwrap();
        doc.remove_attribute(el, NamespaceId::NONE, "x", false);
        assert_eq!(bridge.persist(el, "x").unwrap(), PersistOutcome::Removed);
        assert!(!store.has("doc", "e", "x").unwrap());
    }

    #[test]
    fn persist_without_id_is_rejected() {
        let (doc, store, _) = setup();
        let bridge = PersistenceBridge::new(&doc, store, BridgeConfig::default());
        let anon = doc.create_element(ElementKind::Generic, "box");
        doc.set_attribute(anon, NamespaceId::NONE, "x", "1", false);

        let err = bridge.persist(anon, "x").unwrap_err();
        assert!(matches!(err, BridgeError::MissingId(node) if node == anon));
        assert!(err.is_expected());
    }

    #[test]
    fn persist_removed_element_is_rejected() {
        let (doc, store, el) = setup();
        let bridge = PersistenceBridge::new(&doc, store, BridgeConfig::default());
        doc.remove_element(el);
        assert!(matches!(bridge.persist(el, "x"), Err(BridgeError::NoSuchElement(_))));
    }

    #[test]
    fn undeclared_by_write_time_is_not_persisted() {
        let (doc, store, el) = setup();
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
        bridge.init();

        doc.set_attribute(el, NamespaceId::NONE, "x", "1", true);
        doc.set_attribute(el, NamespaceId::NONE, "persist", "y", false);
        assert_eq!(doc.task_queue().run_until_idle(), 1);
        assert!(!store.has("doc", "e", "x").unwrap());

        assert_eq!(bridge.inner.persist_declared(el, "x").unwrap(), PersistOutcome::Excluded);
    }

    #[test]
    fn other_namespaces_are_ignored() {
        let (doc, store, el) = setup();
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
        bridge.init();

        doc.set_attribute(el, NamespaceId(7), "x", "1", true);
        assert_eq!(doc.task_queue().pending(), 0);
    }

    #[test]
    fn drop_detaches() {
        let (doc, store, el) = setup();
        {
            let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
            bridge.init();
            assert!(bridge.is_attached());
            doc.set_attribute(el, NamespaceId::NONE, "x", "1", true);
        }
        assert_eq!(doc.observer_count(), 0);

        doc.task_queue().run_until_idle();
        assert!(!store.has("doc", "e", "x").unwrap());
    }

    #[test]
    fn dropped_document_detaches_bridge() {
        let (doc, store, _) = setup();
        let bridge = PersistenceBridge::new(&doc, store, BridgeConfig::default());
        drop(doc);

        assert!(!bridge.is_attached());
        assert!(matches!(bridge.apply_persistent_attributes(), Err(BridgeError::Detached)));
        assert_eq!(bridge.init(), RestoreReport::default());
    }
}
