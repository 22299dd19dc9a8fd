//! Conversion between [`Document`] and its persisted JSON text.
//!
//! Decoding never fails. Empty, whitespace-only or unparseable text is an
//! empty document, and individual elements that cannot be read are dropped
//! with a warning so the rest of the file survives.
//!
//! Files written by older tools carry no `type` field; their elements are
//! classified once here from the fields they have (`radius` is a circle,
//! `width` and `height` a rectangle, `content` a text label). Everything
//! past the codec sees the explicit [`Element`] union.

use serde_json::{Map, Value};

use crate::{CoreResult, Document, Element, ElementKind};

/// Parse persisted text into a document.
#[must_use]
pub fn decode(text: &str) -> Document {
    if text.trim().is_empty() {
        return Document::empty();
    }

    let root: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Treating unparseable document as empty: {e}");
            return Document::empty();
        }
    };

    let Some(items) = root.get("elements").and_then(Value::as_array) else {
        tracing::warn!("Document has no elements array, treating as empty");
        return Document::empty();
    };

    let elements = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match decode_element(item.clone()) {
            Ok(element) => Some(element),
            Err(reason) => {
                tracing::warn!(index, "Skipping unreadable element: {reason}");
                None
            }
        })
        .collect();

    Document::new(elements)
}

/// Serialize a document to pretty-printed JSON.
///
/// # Errors
///
/// Returns [`crate::CoreError::Serialization`] if serialization fails.
pub fn encode(document: &Document) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

fn decode_element(value: Value) -> Result<Element, String> {
    let Value::Object(mut fields) = value else {
        return Err("element is not an object".to_string());
    };

    if !fields.contains_key("type") {
        let kind = infer_kind(&fields).ok_or("cannot determine element kind")?;
        fields.insert("type".to_string(), Value::from(kind.as_str()));
    }

    let element: Element =
        serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())?;
    element.validate().map_err(|e| e.to_string())?;
    Ok(element)
}

fn infer_kind(fields: &Map<String, Value>) -> Option<ElementKind> {
    if fields.contains_key("radius") {
        Some(ElementKind::Circle)
    } else if fields.contains_key("width") && fields.contains_key("height") {
        Some(ElementKind::Rectangle)
    } else if fields.contains_key("content") {
        Some(ElementKind::Text)
    } else {
        None
    }
}
