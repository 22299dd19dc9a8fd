//! In-memory element storage for a single document.
//!
//! [`ElementStore`] is the authoritative mirror of a document's elements.
//! Elements are indexed by id and kept in insertion order, which is also the
//! order they are persisted and drawn in.

use std::collections::HashMap;

use crate::{Document, Element, ElementId};

/// Ordered, id-indexed collection of elements.
///
/// # Example
///
/// ```
/// use luke_core::{Circle, Element, ElementStore};
///
/// let mut store = ElementStore::new();
/// store.put(Element::Circle(Circle {
///     id: "c1".into(),
///     x: 0.0,
///     y: 0.0,
///     radius: 4.0,
///     color: "#000000".to_string(),
/// }));
///
/// assert!(store.get_by_id("c1").is_some());
/// assert!(store.delete("c1"));
/// assert!(!store.delete("c1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementStore {
    /// All elements, indexed by ID.
    elements: HashMap<ElementId, Element>,
    /// Element IDs in insertion order.
    order: Vec<ElementId>,
}

impl ElementStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a sequence of elements.
    ///
    /// Later elements replace earlier ones with the same id.
    #[must_use]
    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        let mut store = Self::new();
        for element in elements {
            store.put(element);
        }
        store
    }

    /// Insert an element, or replace the one with the same id.
    ///
    /// A replaced element keeps its original position.
    pub fn put(&mut self, element: Element) -> &Element {
        let id = element.id().clone();
        if !self.elements.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.elements.insert(id.clone(), element);
        &self.elements[&id]
    }

    /// All elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Clone all elements in insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Element> {
        self.elements().cloned().collect()
    }

    /// Look up an element by id.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Remove an element, reporting whether it existed.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.elements.remove(id).is_some() {
            self.order.retain(|eid| eid.as_str() != id);
            true
        } else {
            false
        }
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.order.clear();
    }

    /// Replace the entire contents in one step.
    pub fn load_all(&mut self, elements: impl IntoIterator<Item = Element>) {
        *self = Self::from_elements(elements);
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot the store as a document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        Document::new(self.get_all())
    }
}
