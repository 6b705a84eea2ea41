//! A minimal live document: elements, attributes and mutation observers.

use crate::task::TaskQueue;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Handle to an element of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Attribute namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespaceId(pub i32);

impl NamespaceId {
    /// The null namespace, used for ordinary attributes.
    pub const NONE: Self = Self(0);
}

/// What kind of element a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A window-class element whose geometry is owned by the window itself.
    Window,
    /// Any other element.
    Generic,
}

/// Trust level of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// Privileged application chrome.
    System,
    /// Untrusted content.
    Content,
}

/// Where a document is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowHost {
    /// The document is the root of a top-level application window.
    TopLevelChrome,
    /// The document is nested inside another document.
    Nested,
    /// Neither: not nested, and not owned by a top-level window.
    Standalone,
}

/// How an attribute changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// The attribute did not exist before.
    Addition,
    /// The attribute existed and was set again.
    Modification,
    /// The attribute was removed.
    Removal,
}

/// One attribute change, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMutation {
    /// The element that changed.
    pub element: NodeId,
    /// Namespace of the attribute.
    pub namespace: NamespaceId,
    /// Attribute name.
    pub attribute: String,
    /// Kind of change.
    pub kind: MutationKind,
    /// Value before the change, if there was one.
    pub old_value: Option<String>,
}

/// Receives attribute mutations of a document.
///
/// Called synchronously while the mutation is being delivered. The document
/// may be read but should not be mutated from here; queue work on the
/// document's [`TaskQueue`] instead.
pub trait MutationObserver {
    /// Called after an attribute of `document` changed.
    fn attribute_changed(&self, document: &Document, mutation: &AttributeMutation);
}

/// Handle returned by [`Document::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Options for creating a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Document URI; the store namespaces values by it.
    pub uri: String,
    /// Trust level.
    pub principal: Principal,
    /// Window placement.
    pub host: WindowHost,
}

impl DocumentOptions {
    /// A privileged standalone document.
    pub fn chrome(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            principal: Principal::System,
            host: WindowHost::Standalone,
        }
    }

    /// An unprivileged standalone document.
    pub fn content(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            principal: Principal::Content,
            host: WindowHost::Standalone,
        }
    }

    /// Sets the window placement.
    #[must_use]
    pub fn host(mut self, host: WindowHost) -> Self {
        self.host = host;
        self
    }
}

#[derive(Debug)]
struct Element {
    kind: ElementKind,
    tag: String,
    attributes: BTreeMap<(NamespaceId, String), String>,
}

/// A live, single-threaded element tree.
///
/// Elements live in creation order, which is also the order in which
/// [`get_all_elements_for_id`](Self::get_all_elements_for_id) discovers
/// them. Every attribute change made with `notify` set is reported to each
/// registered observer before the mutating call returns.
///
/// Removing an element leaves an empty slot behind, and id lookups scan
/// every slot, so the arena only grows. That suits a document living as
/// long as one page, not a long-running tree with heavy churn.
pub struct Document {
    options: DocumentOptions,
    elements: RefCell<Vec<Option<Element>>>,
    observers: RefCell<Vec<(ObserverId, Rc<dyn MutationObserver>)>>,
    next_observer: Cell<u64>,
    tasks: Rc<TaskQueue>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("options", &self.options)
            .field("elements", &self.elements.borrow().len())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

impl Document {
    /// Creates an empty document with its own task queue.
    #[must_use]
    pub fn new(options: DocumentOptions) -> Rc<Self> {
        Self::with_task_queue(options, Rc::new(TaskQueue::new()))
    }

    /// Creates an empty document that schedules work on `tasks`.
    #[must_use]
    pub fn with_task_queue(options: DocumentOptions, tasks: Rc<TaskQueue>) -> Rc<Self> {
        Rc::new(Self {
            options,
            elements: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(0),
            tasks,
        })
    }

    /// Returns the document URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.options.uri
    }

    /// Returns the document's trust level.
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.options.principal
    }

    /// Returns true for privileged documents.
    #[must_use]
    pub fn is_system_principal(&self) -> bool {
        self.options.principal == Principal::System
    }

    /// Returns where the document is displayed.
    #[must_use]
    pub fn host(&self) -> WindowHost {
        self.options.host
    }

    /// Returns the task queue of the document's event loop.
    #[must_use]
    pub fn task_queue(&self) -> &Rc<TaskQueue> {
        &self.tasks
    }

    /// Adds an element and returns its handle.
    pub fn create_element(&self, kind: ElementKind, tag: impl Into<String>) -> NodeId {
        let mut elements = self.elements.borrow_mut();
        elements.push(Some(Element {
            kind,
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }));
        NodeId(elements.len() - 1)
    }

    /// Removes an element. Returns false if it was already gone.
    pub fn remove_element(&self, node: NodeId) -> bool {
        self.elements
            .borrow_mut()
            .get_mut(node.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Returns true if the element exists.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        matches!(self.elements.borrow().get(node.0), Some(Some(_)))
    }

    /// Returns the element's kind.
    #[must_use]
    pub fn element_kind(&self, node: NodeId) -> Option<ElementKind> {
        self.with_element(node, |el| el.kind)
    }

    /// Returns the element's tag name.
    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.with_element(node, |el| el.tag.clone())
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn get_attribute(&self, node: NodeId, namespace: NamespaceId, name: &str) -> Option<String> {
        self.with_element(node, |el| {
            el.attributes.get(&(namespace, name.to_string())).cloned()
        })
        .flatten()
    }

    /// Sets an attribute, notifying observers if `notify` is true.
    ///
    /// Returns false if the element does not exist.
    pub fn set_attribute(
        &self,
        node: NodeId,
        namespace: NamespaceId,
        name: &str,
        value: &str,
        notify: bool,
    ) -> bool {
        let old_value = {
            let mut elements = self.elements.borrow_mut();
            let Some(Some(element)) = elements.get_mut(node.0) else {
                return false;
            };
            element
                .attributes
                .insert((namespace, name.to_string()), value.to_string())
        };

        if notify {
            let kind = if old_value.is_some() {
                MutationKind::Modification
            } else {
                MutationKind::Addition
            };
            self.notify(AttributeMutation {
                element: node,
                namespace,
                attribute: name.to_string(),
                kind,
                old_value,
            });
        }
        true
    }

    /// Removes an attribute, notifying observers if `notify` is true and the
    /// attribute existed.
    ///
    /// Returns false if the element or the attribute does not exist.
    pub fn remove_attribute(
        &self,
        node: NodeId,
        namespace: NamespaceId,
        name: &str,
        notify: bool,
    ) -> bool {
        let old_value = {
            let mut elements = self.elements.borrow_mut();
            let Some(Some(element)) = elements.get_mut(node.0) else {
                return false;
            };
            element.attributes.remove(&(namespace, name.to_string()))
        };

        let Some(old_value) = old_value else {
            return false;
        };
        if notify {
            self.notify(AttributeMutation {
                element: node,
                namespace,
                attribute: name.to_string(),
                kind: MutationKind::Removal,
                old_value: Some(old_value),
            });
        }
        true
    }

    /// Returns every live element whose `id` attribute equals `id`, in
    /// discovery order.
    #[must_use]
    pub fn get_all_elements_for_id(&self, id: &str) -> Vec<NodeId> {
        let key = (NamespaceId::NONE, "id".to_string());
        self.elements
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let element = slot.as_ref()?;
                (element.attributes.get(&key).map(String::as_str) == Some(id))
                    .then_some(NodeId(index))
            })
            .collect()
    }

    /// Registers an observer for attribute mutations.
    pub fn add_observer(&self, observer: Rc<dyn MutationObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer.get());
        self.next_observer.set(id.0 + 1);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    /// Unregisters an observer. Returns false if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != id);
        observers.len() != before
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn with_element<T>(&self, node: NodeId, f: impl FnOnce(&Element) -> T) -> Option<T> {
        match self.elements.borrow().get(node.0) {
            Some(Some(element)) => Some(f(element)),
            _ => None,
        }
    }

    fn notify(&self, mutation: AttributeMutation) {
        // Observers may add or remove observers while being notified.
        let observers: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        trace!(
            attribute = %mutation.attribute,
            kind = ?mutation.kind,
            observers = observers.len(),
            "attribute changed"
        );
        for observer in observers {
            observer.attribute_changed(self, &mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<AttributeMutation>>,
    }

    impl MutationObserver for Recorder {
        fn attribute_changed(&self, document: &Document, mutation: &AttributeMutation) {
            // Reading the document during delivery must not panic.
            let _ = document.get_attribute(mutation.element, mutation.namespace, &mutation.attribute);
            self.seen.borrow_mut().push(mutation.clone());
        }
    }

    #[test]
    fn attributes_set_and_remove() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let el = doc.create_element(ElementKind::Generic, "box");

        assert!(doc.set_attribute(el, NamespaceId::NONE, "width", "10", false));
        assert_eq!(doc.get_attribute(el, NamespaceId::NONE, "width").as_deref(), Some("10"));
        assert_eq!(doc.get_attribute(el, NamespaceId(3), "width"), None);

        assert!(doc.remove_attribute(el, NamespaceId::NONE, "width", false));
        assert!(!doc.remove_attribute(el, NamespaceId::NONE, "width", false));
        assert_eq!(doc.get_attribute(el, NamespaceId::NONE, "width"), None);
    }

    #[test]
    fn observers_see_mutation_kinds() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let el = doc.create_element(ElementKind::Generic, "box");
        let recorder = Rc::new(Recorder::default());
        doc.add_observer(recorder.clone());

        doc.set_attribute(el, NamespaceId::NONE, "a", "1", true);
        doc.set_attribute(el, NamespaceId::NONE, "a", "2", true);
        doc.remove_attribute(el, NamespaceId::NONE, "a", true);
        doc.set_attribute(el, NamespaceId::NONE, "quiet", "1", false);

        let seen = recorder.seen.borrow();
        let kinds: Vec<_> = seen.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MutationKind::Addition,
                MutationKind::Modification,
                MutationKind::Removal
            ]
        );
        assert_eq!(seen[1].old_value.as_deref(), Some("1"));
        assert_eq!(seen[2].old_value.as_deref(), Some("2"));
    }

    #[test]
    fn removed_observer_is_not_called() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let el = doc.create_element(ElementKind::Generic, "box");
        let recorder = Rc::new(Recorder::default());
        let id = doc.add_observer(recorder.clone());

        assert!(doc.remove_observer(id));
        assert!(!doc.remove_observer(id));
        assert_eq!(doc.observer_count(), 0);

        doc.set_attribute(el, NamespaceId::NONE, "a", "1", true);
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn elements_for_id_in_discovery_order() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let first = doc.create_element(ElementKind::Generic, "box");
        let other = doc.create_element(ElementKind::Generic, "box");
        let second = doc.create_element(ElementKind::Generic, "box");
        doc.set_attribute(first, NamespaceId::NONE, "id", "dup", false);
        doc.set_attribute(other, NamespaceId::NONE, "id", "other", false);
        doc.set_attribute(second, NamespaceId::NONE, "id", "dup", false);

        assert_eq!(doc.get_all_elements_for_id("dup"), vec![first, second]);
        assert!(doc.get_all_elements_for_id("missing").is_empty());

        doc.remove_element(first);
        assert_eq!(doc.get_all_elements_for_id("dup"), vec![second]);
    }

    #[test]
    fn removed_slot_is_not_reused() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let first = doc.create_element(ElementKind::Generic, "box");
        doc.set_attribute(first, NamespaceId::NONE, "id", "a", false);
        doc.remove_element(first);

        let second = doc.create_element(ElementKind::Generic, "box");
        doc.set_attribute(second, NamespaceId::NONE, "id", "a", false);
        assert_ne!(first, second);
        assert!(!doc.contains(first));
        assert_eq!(doc.get_all_elements_for_id("a"), vec![second]);
    }

    #[test]
    fn removed_element_rejects_mutation() {
        let doc = Document::new(DocumentOptions::chrome("doc"));
        let el = doc.create_element(ElementKind::Window, "window");
        assert_eq!(doc.element_kind(el), Some(ElementKind::Window));
        assert_eq!(doc.tag_name(el).as_deref(), Some("window"));

        assert!(doc.remove_element(el));
        assert!(!doc.remove_element(el));
        assert!(!doc.contains(el));
        assert!(!doc.set_attribute(el, NamespaceId::NONE, "a", "1", true));
        assert_eq!(doc.element_kind(el), None);
    }
}
