//! Sorted, forward-only iteration over key components.

use crate::error::{StoreError, StoreResult};
use crate::key::StoreKey;
use attrstore_engine::EngineCursor;
use tracing::{trace, warn};

/// Which part of the key an iterator yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Distinct documents.
    Document,
    /// Distinct element ids of one document.
    Id,
    /// Attribute names of one `(document, id)`.
    Attribute,
}

impl Component {
    fn pick(self, key: StoreKey) -> String {
        match self {
            Self::Document => key.document,
            Self::Id => key.id,
            Self::Attribute => key.attribute,
        }
    }
}

/// A forward-only cursor yielding one key component per distinct value.
///
/// The iterator wraps an engine cursor over a snapshot of a key range and
/// decodes keys as it goes. Values come out in ascending order with
/// duplicates removed. Keys that fail to decode are logged and skipped; see
/// [`StoreIterator::skipped`].
///
/// # Lifecycle
///
/// One value is always decoded ahead, so [`has_more`](Self::has_more) is a
/// plain read. The engine cursor is released by [`close`](Self::close) or
/// on drop, whichever comes first; closing again does nothing. The iterator
/// cannot be rewound, ask the store for a new one instead.
///
/// # Example
///
/// ```rust
/// use attrstore_core::AttrStore;
///
/// let store = AttrStore::open_in_memory();
/// store.set("doc", "b", "x", "1").unwrap();
/// store.set("doc", "a", "x", "1").unwrap();
///
/// let mut ids = store.ids("doc").unwrap();
/// while ids.has_more() {
///     println!("{}", ids.get_next().unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct StoreIterator {
    cursor: Option<EngineCursor>,
    component: Component,
    next: Option<String>,
    skipped: usize,
}

impl StoreIterator {
    pub(crate) fn new(cursor: EngineCursor, component: Component) -> Self {
        let mut iter = Self {
            cursor: Some(cursor),
            component,
            next: None,
            skipped: 0,
        };
        iter.advance(None);
        iter
    }

    /// Creates an iterator with nothing to yield.
    #[must_use]
    pub fn empty(component: Component) -> Self {
        Self {
            cursor: None,
            component,
            next: None,
            skipped: 0,
        }
    }

    /// Returns true if [`get_next`](Self::get_next) will yield a value.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Returns the next value and moves past it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IterationFinished`] if [`has_more`](Self::has_more)
    /// is false.
    pub fn get_next(&mut self) -> StoreResult<String> {
        let value = self.next.take().ok_or(StoreError::IterationFinished)?;
        self.advance(Some(&value));
        Ok(value)
    }

    /// Returns which key component this iterator yields.
    #[must_use]
    pub fn component(&self) -> Component {
        self.component
    }

    /// Returns how many undecodable keys were skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Returns true once the engine cursor has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Releases the engine cursor. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.cursor.take().is_some() {
            trace!(component = ?self.component, "released store iterator cursor");
        }
        self.next = None;
    }

    /// Decodes ahead to the next value different from `previous`.
    fn advance(&mut self, previous: Option<&str>) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };

        for (key, _) in cursor.by_ref() {
            let value = match StoreKey::decode(&key) {
                Ok(decoded) => self.component.pick(decoded),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable key");
                    self.skipped += 1;
                    continue;
                }
            };
            if previous == Some(value.as_str()) {
                continue;
            }
            self.next = Some(value);
            return;
        }
    }
}

impl Iterator for StoreIterator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().ok()
    }
}

impl Drop for StoreIterator {
    fn drop(&mut self) {
        self.close();
    }
}
