//! End-to-end tests of the persistence bridge against real stores.

use attrstore_bridge::{
    BridgeConfig, BridgeError, Document, DocumentOptions, ElementKind, NamespaceId, NodeId,
    PersistenceBridge, RestoreReport, TokenMatch, WindowHost,
};
use attrstore_core::{
    document_prefix, encode_value, id_prefix, AttrStore, ErrorKind, FileEngine, KvEngine,
    StoreConfig, StoreKey,
};
use std::rc::Rc;
use std::sync::Arc;
use tempfile::tempdir;

fn element(doc: &Document, kind: ElementKind, id: &str, persist: &str) -> NodeId {
    let el = doc.create_element(kind, "el");
    doc.set_attribute(el, NamespaceId::NONE, "id", id, false);
    if !persist.is_empty() {
        doc.set_attribute(el, NamespaceId::NONE, "persist", persist, false);
    }
    el
}

fn attr(doc: &Document, el: NodeId, name: &str) -> Option<String> {
    doc.get_attribute(el, NamespaceId::NONE, name)
}

fn change(doc: &Document, el: NodeId, name: &str, value: &str) {
    doc.set_attribute(el, NamespaceId::NONE, name, value, true);
    doc.task_queue().run_until_idle();
}

#[test]
fn end_to_end_store_and_restore() {
    let store = Arc::new(AttrStore::open_in_memory());

    {
        let doc = Document::new(DocumentOptions::chrome("d"));
        let el = element(&doc, ElementKind::Generic, "e", "x");
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
        bridge.init();

        change(&doc, el, "x", "42");
        assert_eq!(store.get_value("d", "e", "x").unwrap(), "42");
    }

    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    let report = bridge.init();

    assert_eq!(attr(&doc, el, "x").as_deref(), Some("42"));
    assert_eq!(report, RestoreReport { ids: 1, applied: 1, skipped: 0 });
    // Restoring must not schedule writes of its own.
    assert_eq!(doc.task_queue().pending(), 0);
}

#[test]
fn empty_value_removes_entry() {
    let store = Arc::new(AttrStore::open_in_memory());
    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    bridge.init();

    change(&doc, el, "x", "1");
    assert!(store.has("d", "e", "x").unwrap());

    change(&doc, el, "x", "");
    assert!(!store.has("d", "e", "x").unwrap());

    change(&doc, el, "x", "2");
    doc.remove_attribute(el, NamespaceId::NONE, "x", true);
    doc.task_queue().run_until_idle();
    assert!(!store.has("d", "e", "x").unwrap());
}

#[test]
fn undeclared_attributes_are_not_stored() {
    let store = Arc::new(AttrStore::open_in_memory());
    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    bridge.init();

    change(&doc, el, "y", "1");
    assert!(store.ids("d").unwrap().next().is_none());
}

#[test]
fn window_geometry_never_stored() {
    let store = Arc::new(AttrStore::open_in_memory());
    let doc = Document::new(DocumentOptions::chrome("d"));
    let win = element(
        &doc,
        ElementKind::Window,
        "main",
        "screenX screenY width height sizemode title",
    );
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    bridge.init();

    for name in ["screenX", "screenY", "width", "height", "sizemode", "title"] {
        change(&doc, win, name, "1");
    }

    let stored: Vec<_> = store.attributes("d", "main").unwrap().collect();
    assert_eq!(stored, vec!["title"]);
}

#[test]
fn top_level_chrome_window_is_left_alone() {
    let store = Arc::new(AttrStore::open_in_memory());
    store.set("d", "main", "title", "stored").unwrap();
    store.set("d", "side", "width", "200").unwrap();

    let options = DocumentOptions::chrome("d").host(WindowHost::TopLevelChrome);
    let doc = Document::new(options);
    let win = element(&doc, ElementKind::Window, "main", "title");
    let side = element(&doc, ElementKind::Generic, "side", "width");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    let report = bridge.init();

    assert_eq!(attr(&doc, win, "title"), None);
    assert_eq!(attr(&doc, side, "width").as_deref(), Some("200"));
    assert_eq!(report.applied, 1);

    change(&doc, win, "title", "changed");
    assert_eq!(store.get_value("d", "main", "title").unwrap(), "stored");
}

#[test]
fn restore_skips_corrupt_entries() {
    let store = Arc::new(AttrStore::open_in_memory());
    store.set("d", "a", "one", "1").unwrap();
    store.set("d", "a", "three", "3").unwrap();
    store.set("d", "b", "x", "bx").unwrap();
    let bad = StoreKey::new("d", "a", "two").encode();
    store.engine().put(&bad, &[0xFF, 0x00]).unwrap();

    let doc = Document::new(DocumentOptions::chrome("d"));
    let a = element(&doc, ElementKind::Generic, "a", "");
    let b = element(&doc, ElementKind::Generic, "b", "");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    let report = bridge.init();

    assert_eq!(attr(&doc, a, "one").as_deref(), Some("1"));
    assert_eq!(attr(&doc, a, "two"), None);
    assert_eq!(attr(&doc, a, "three").as_deref(), Some("3"));
    assert_eq!(attr(&doc, b, "x").as_deref(), Some("bx"));
    assert_eq!(report, RestoreReport { ids: 2, applied: 3, skipped: 1 });
}

#[test]
fn restore_counts_undecodable_keys() {
    let store = Arc::new(AttrStore::open_in_memory());
    store.set("d", "a", "one", "1").unwrap();
    let value = encode_value("v").unwrap();

    // Attribute bytes that are not UTF-8, under a live id.
    let mut bad_attr = id_prefix("d", "a");
    bad_attr.extend_from_slice(&[0xC3, 0x28, 0x00, 0x01]);
    store.engine().put(&bad_attr, &value).unwrap();

    // An id that is not UTF-8.
    let mut bad_id = document_prefix("d");
    bad_id.extend_from_slice(&[0xC3, 0x28, 0x00, 0x01]);
    bad_id.extend_from_slice(&[b'x', 0x00, 0x01]);
    store.engine().put(&bad_id, &value).unwrap();

    let doc = Document::new(DocumentOptions::chrome("d"));
    let a = element(&doc, ElementKind::Generic, "a", "");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    let report = bridge.init();

    assert_eq!(attr(&doc, a, "one").as_deref(), Some("1"));
    assert_eq!(report, RestoreReport { ids: 1, applied: 1, skipped: 2 });
}

#[test]
fn restore_applies_to_every_matching_element() {
    let store = Arc::new(AttrStore::open_in_memory());
    store.set("d", "dup", "x", "v").unwrap();
    store.set("d", "gone", "x", "v").unwrap();

    let doc = Document::new(DocumentOptions::chrome("d"));
    let first = element(&doc, ElementKind::Generic, "dup", "");
    let second = element(&doc, ElementKind::Generic, "dup", "");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    let report = bridge.init();

    assert_eq!(attr(&doc, first, "x").as_deref(), Some("v"));
    assert_eq!(attr(&doc, second, "x").as_deref(), Some("v"));
    assert_eq!(report, RestoreReport { ids: 2, applied: 2, skipped: 0 });
}

#[test]
fn detach_cancels_pending_writes() {
    let store = Arc::new(AttrStore::open_in_memory());
    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    bridge.init();

    doc.set_attribute(el, NamespaceId::NONE, "x", "1", true);
    assert_eq!(doc.task_queue().pending(), 1);

    bridge.drop_document_reference();
    bridge.drop_document_reference();
    assert!(!bridge.is_attached());
    assert!(!bridge.is_subscribed());
    assert_eq!(doc.observer_count(), 0);

    doc.task_queue().run_until_idle();
    assert!(!store.has("d", "e", "x").unwrap());

    change(&doc, el, "x", "2");
    assert!(!store.has("d", "e", "x").unwrap());
}

#[test]
fn content_documents_are_ignored() {
    let store = Arc::new(AttrStore::open_in_memory());
    store.set("d", "e", "x", "stored").unwrap();

    let doc = Document::new(DocumentOptions::content("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());

    assert_eq!(bridge.init(), RestoreReport::default());
    assert!(!bridge.is_subscribed());
    assert_eq!(attr(&doc, el, "x"), None);

    change(&doc, el, "x", "changed");
    assert_eq!(store.get_value("d", "e", "x").unwrap(), "stored");
    assert!(bridge.persist(el, "x").unwrap_err().is_expected());
}

#[test]
fn token_matching_modes() {
    let store = Arc::new(AttrStore::open_in_memory());

    let exact_doc = Document::new(DocumentOptions::chrome("exact"));
    let el = element(&exact_doc, ElementKind::Generic, "e", "xy");
    let exact = PersistenceBridge::new(&exact_doc, Arc::clone(&store), BridgeConfig::default());
    exact.init();
    change(&exact_doc, el, "x", "1");
    assert!(!store.has("exact", "e", "x").unwrap());

    let legacy_doc = Document::new(DocumentOptions::chrome("legacy"));
    let el = element(&legacy_doc, ElementKind::Generic, "e", "xy");
    let config = BridgeConfig::default().token_match(TokenMatch::Substring);
    let legacy = PersistenceBridge::new(&legacy_doc, Arc::clone(&store), config);
    legacy.init();
    change(&legacy_doc, el, "x", "1");
    assert!(store.has("legacy", "e", "x").unwrap());
}

#[test]
fn bridges_share_one_store() {
    let store = Arc::new(AttrStore::open_in_memory());
    let doc_a = Document::new(DocumentOptions::chrome("a"));
    let doc_b = Document::new(DocumentOptions::chrome("b"));
    let el_a = element(&doc_a, ElementKind::Generic, "e", "x");
    let el_b = element(&doc_b, ElementKind::Generic, "e", "x");
    let bridge_a = PersistenceBridge::new(&doc_a, Arc::clone(&store), BridgeConfig::default());
    let bridge_b = PersistenceBridge::new(&doc_b, Arc::clone(&store), BridgeConfig::default());
    bridge_a.init();
    bridge_b.init();

    change(&doc_a, el_a, "x", "from-a");
    change(&doc_b, el_b, "x", "from-b");

    assert_eq!(store.get_value("a", "e", "x").unwrap(), "from-a");
    assert_eq!(store.get_value("b", "e", "x").unwrap(), "from-b");
}

#[test]
fn restore_from_reopened_file_store() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("store");

    {
        let store = Arc::new(AttrStore::open(&path).unwrap());
        let doc = Document::new(DocumentOptions::chrome("d"));
        let el = element(&doc, ElementKind::Generic, "panel", "width collapsed");
        let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
        bridge.init();
        change(&doc, el, "width", "300");
        change(&doc, el, "collapsed", "true");
        store.flush().unwrap();
    }

    let store = Arc::new(AttrStore::open(&path).unwrap());
    let doc: Rc<Document> = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "panel", "width collapsed");
    let bridge = PersistenceBridge::new(&doc, store, BridgeConfig::default());
    bridge.init();

    assert_eq!(attr(&doc, el, "width").as_deref(), Some("300"));
    assert_eq!(attr(&doc, el, "collapsed").as_deref(), Some("true"));
}

fn closable_store(dir: &std::path::Path) -> (Arc<FileEngine>, Arc<AttrStore>) {
    let engine = Arc::new(FileEngine::open(&dir.join("attrs.log")).unwrap());
    let store = AttrStore::with_engine(engine.clone(), StoreConfig::default());
    (engine, Arc::new(store))
}

#[test]
fn failed_write_leaves_document_untouched() {
    let temp = tempdir().unwrap();
    let (engine, store) = closable_store(temp.path());

    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());
    bridge.init();
    change(&doc, el, "x", "1");
    assert_eq!(store.get_value("d", "e", "x").unwrap(), "1");

    engine.close().unwrap();

    doc.set_attribute(el, NamespaceId::NONE, "x", "2", true);
    assert_eq!(doc.task_queue().run_until_idle(), 1);
    assert_eq!(attr(&doc, el, "x").as_deref(), Some("2"));
    assert!(bridge.is_subscribed());

    let err = bridge.persist(el, "x").unwrap_err();
    assert!(!err.is_expected());
}

#[test]
fn restore_on_failed_store_reports_store_error() {
    let temp = tempdir().unwrap();
    let (engine, store) = closable_store(temp.path());
    store.set("d", "e", "x", "1").unwrap();
    engine.close().unwrap();

    let doc = Document::new(DocumentOptions::chrome("d"));
    let el = element(&doc, ElementKind::Generic, "e", "x");
    let bridge = PersistenceBridge::new(&doc, Arc::clone(&store), BridgeConfig::default());

    match bridge.apply_persistent_attributes() {
        Err(BridgeError::Store(err)) => assert_eq!(err.kind(), ErrorKind::StorageFailure),
        other => panic!("expected a store error, got {other:?}"),
    }
    assert_eq!(bridge.init(), RestoreReport::default());
    assert_eq!(attr(&doc, el, "x"), None);
}
