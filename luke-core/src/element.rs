//! Canvas elements - the drawable objects of a document.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Color used when a draw command omits one.
pub const DEFAULT_COLOR: &str = "#000000";

/// Font size used when a text element omits one.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Maximum length of an element identifier.
pub const MAX_ELEMENT_ID_LEN: usize = 128;

/// Maximum length of a color string.
pub const MAX_COLOR_LEN: usize = 64;

/// Maximum text content length in bytes.
pub const MAX_TEXT_CONTENT_LEN: usize = 1_048_576; // 1MB

/// Identifier of an element, unique within a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

const fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

/// A circle centered on (`x`, `y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Element identifier.
    #[serde(default)]
    pub id: ElementId,
    /// Center X coordinate.
    pub x: f64,
    /// Center Y coordinate.
    pub y: f64,
    /// Radius in canvas units.
    pub radius: f64,
    /// Fill color.
    #[serde(default = "default_color")]
    pub color: String,
}

/// An axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Element identifier.
    #[serde(default)]
    pub id: ElementId,
    /// Top-left X coordinate.
    pub x: f64,
    /// Top-left Y coordinate.
    pub y: f64,
    /// Width in canvas units.
    pub width: f64,
    /// Height in canvas units.
    pub height: f64,
    /// Fill color.
    #[serde(default = "default_color")]
    pub color: String,
}

/// A text label anchored at (`x`, `y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    /// Element identifier.
    #[serde(default)]
    pub id: ElementId,
    /// Anchor X coordinate.
    pub x: f64,
    /// Anchor Y coordinate.
    pub y: f64,
    /// Text content.
    pub content: String,
    /// Font size in canvas units.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Text color.
    #[serde(default = "default_color")]
    pub color: String,
}

/// Discriminant of an [`Element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// [`Circle`]
    Circle,
    /// [`Rectangle`]
    Rectangle,
    /// [`Text`]
    Text,
}

impl ElementKind {
    /// Wire name of the kind, as used in the `type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drawable element.
///
/// Serialized with an explicit `type` discriminant:
///
/// ```
/// use luke_core::{Circle, Element};
///
/// let circle = Element::Circle(Circle {
///     id: "c1".into(),
///     x: 10.0,
///     y: 10.0,
///     radius: 5.0,
///     color: "#ff0000".to_string(),
/// });
/// let json = serde_json::to_value(&circle).unwrap();
/// assert_eq!(json["type"], "circle");
/// assert_eq!(json["radius"], 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    /// A circle.
    Circle(Circle),
    /// A rectangle.
    Rectangle(Rectangle),
    /// A text label.
    Text(Text),
}

impl Element {
    /// The element's identifier.
    #[must_use]
    pub fn id(&self) -> &ElementId {
        match self {
            Self::Circle(c) => &c.id,
            Self::Rectangle(r) => &r.id,
            Self::Text(t) => &t.id,
        }
    }

    fn id_mut(&mut self) -> &mut ElementId {
        match self {
            Self::Circle(c) => &mut c.id,
            Self::Rectangle(r) => &mut r.id,
            Self::Text(t) => &mut t.id,
        }
    }

    /// The element's discriminant.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Circle(_) => ElementKind::Circle,
            Self::Rectangle(_) => ElementKind::Rectangle,
            Self::Text(_) => ElementKind::Text,
        }
    }

    /// The element's color.
    #[must_use]
    pub fn color(&self) -> &str {
        match self {
            Self::Circle(c) => &c.color,
            Self::Rectangle(r) => &r.color,
            Self::Text(t) => &t.color,
        }
    }

    /// Assign a generated identifier if the element has none.
    #[must_use]
    pub fn with_generated_id(mut self) -> Self {
        if self.id().is_empty() {
            *self.id_mut() = ElementId::generate();
        }
        self
    }

    /// Check the element invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidElement`] if the id is empty or too long,
    /// a coordinate is not finite, a size is negative, or the color is
    /// malformed.
    pub fn validate(&self) -> CoreResult<()> {
        let id = self.id();
        if id.is_empty() {
            return Err(invalid(id, "id must not be empty"));
        }
        if id.as_str().len() > MAX_ELEMENT_ID_LEN {
            return Err(invalid(
                id,
                &format!("id too long (max {MAX_ELEMENT_ID_LEN} chars)"),
            ));
        }

        match self {
            Self::Circle(c) => {
                check_coordinate(id, "x", c.x)?;
                check_coordinate(id, "y", c.y)?;
                check_size(id, "radius", c.radius)?;
            }
            Self::Rectangle(r) => {
                check_coordinate(id, "x", r.x)?;
                check_coordinate(id, "y", r.y)?;
                check_size(id, "width", r.width)?;
                check_size(id, "height", r.height)?;
            }
            Self::Text(t) => {
                check_coordinate(id, "x", t.x)?;
                check_coordinate(id, "y", t.y)?;
                check_size(id, "fontSize", t.font_size)?;
                if t.content.len() > MAX_TEXT_CONTENT_LEN {
                    return Err(invalid(
                        id,
                        &format!("text content too long (max {MAX_TEXT_CONTENT_LEN} bytes)"),
                    ));
                }
            }
        }

        check_color(id, self.color())
    }
}

fn invalid(id: &ElementId, reason: &str) -> CoreError {
    CoreError::InvalidElement {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn check_coordinate(id: &ElementId, field: &str, value: f64) -> CoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(id, &format!("{field} must be a finite number")))
    }
}

fn check_size(id: &ElementId, field: &str, value: f64) -> CoreResult<()> {
    check_coordinate(id, field, value)?;
    if value < 0.0 {
        return Err(invalid(id, &format!("{field} must not be negative")));
    }
    Ok(())
}

/// Colors are free-form CSS values, except that `#` values must be hex.
fn check_color(id: &ElementId, color: &str) -> CoreResult<()> {
    if color.trim().is_empty() {
        return Err(invalid(id, "color must not be empty"));
    }
    if color.len() > MAX_COLOR_LEN {
        return Err(invalid(
            id,
            &format!("color too long (max {MAX_COLOR_LEN} chars)"),
        ));
    }
    if let Some(hex) = color.strip_prefix('#') {
        let valid_len = matches!(hex.len(), 3 | 4 | 6 | 8);
        if !valid_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(id, &format!("invalid hex color '{color}'")));
        }
    }
    Ok(())
}
