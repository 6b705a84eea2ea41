//! Which element attributes the bridge may persist.

use crate::document::{Document, ElementKind, NamespaceId, NodeId, WindowHost};

/// Attributes of a window element that the window itself persists.
pub const WINDOW_GEOMETRY_ATTRIBUTES: [&str; 5] = ["screenX", "screenY", "width", "height", "sizemode"];

/// Attribute holding an element's persist declarations.
pub(crate) const PERSIST_ATTRIBUTE: &str = "persist";

/// Attribute holding an element's id.
pub(crate) const ID_ATTRIBUTE: &str = "id";

/// How an attribute name is looked up in a `persist` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenMatch {
    /// The name must equal one of the whitespace-separated tokens.
    #[default]
    Exact,
    /// The name may appear anywhere in the list, so `x` matches `"xy"`.
    /// Only for data written by older releases that relied on it.
    Substring,
}

/// Bridge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeConfig {
    /// Matching rule for `persist` lists.
    pub token_match: TokenMatch,
}

impl BridgeConfig {
    /// Sets the matching rule for `persist` lists.
    #[must_use]
    pub const fn token_match(mut self, token_match: TokenMatch) -> Self {
        self.token_match = token_match;
        self
    }
}

/// Returns true if `persist_list` declares `attribute`.
#[must_use]
pub fn declares_persist(persist_list: &str, attribute: &str, mode: TokenMatch) -> bool {
    match mode {
        TokenMatch::Exact => persist_list.split_whitespace().any(|token| token == attribute),
        TokenMatch::Substring => !persist_list.is_empty() && persist_list.contains(attribute),
    }
}

/// Returns true if `element` is the window element of a top-level chrome
/// window. Such elements are left entirely to the window, in both
/// directions.
#[must_use]
pub fn is_excluded_window(document: &Document, element: NodeId) -> bool {
    document.element_kind(element) == Some(ElementKind::Window)
        && document.host() == WindowHost::TopLevelChrome
}

/// Returns true if the window rules allow the bridge to own `attribute`.
pub(crate) fn window_allows(document: &Document, element: NodeId, attribute: &str) -> bool {
    if document.element_kind(element) != Some(ElementKind::Window) {
        return true;
    }
    match document.host() {
        WindowHost::Nested => true,
        WindowHost::TopLevelChrome => false,
        WindowHost::Standalone => !WINDOW_GEOMETRY_ATTRIBUTES.contains(&attribute),
    }
}

/// Decides whether a change of `attribute` on `element` should be written
/// to the store.
///
/// The element must list the attribute in its `persist` attribute, and the
/// window rules must not reserve it.
#[must_use]
pub fn should_persist(
    document: &Document,
    element: NodeId,
    attribute: &str,
    config: &BridgeConfig,
) -> bool {
    let Some(persist) = document.get_attribute(element, NamespaceId::NONE, PERSIST_ATTRIBUTE) else {
        return false;
    };
    declares_persist(&persist, attribute, config.token_match)
        && window_allows(document, element, attribute)
}
