//! The persisted unit: an ordered list of elements.

use serde::{Deserialize, Serialize};

use crate::Element;

/// Canonical document shape, `{ "elements": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Elements in insertion order.
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Document {
    /// Create a document from elements.
    #[must_use]
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Create an empty document.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the document holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
