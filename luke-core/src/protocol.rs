//! Wire format of the controller channel.
//!
//! Every text frame a controller sends is one [`ControlRequest`] and gets
//! exactly one [`ControlResponse`] back.
//!
//! ```json
//! {"type": "draw_circle", "file_path": "/abs/doc.luke", "data": {"x": 1, "y": 2, "radius": 3}}
//! {"success": true, "result": {"type": "circle", "id": "…", "x": 1, "y": 2, "radius": 3, "color": "#000000"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read the active document path.
pub const GET_ACTIVE_FILE: &str = "get_active_file";
/// Open a document and make it active.
pub const SET_FILE: &str = "set_file";
/// Add a circle.
pub const DRAW_CIRCLE: &str = "draw_circle";
/// Add a rectangle.
pub const DRAW_RECTANGLE: &str = "draw_rectangle";
/// Add a text label.
pub const DRAW_TEXT: &str = "draw_text";
/// Remove one element.
pub const DELETE_ELEMENT: &str = "delete_element";
/// Remove every element.
pub const CLEAR_CANVAS: &str = "clear_canvas";
/// List all elements.
pub const GET_ELEMENTS: &str = "get_elements";
/// Look up one element.
pub const GET_ELEMENT_BY_ID: &str = "get_element_by_id";

/// One command from a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Command name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target document. Falls back to `data.file_path`, then the active one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Command arguments.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Opaque correlation id, echoed in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

impl ControlRequest {
    /// A request with no path and no data.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            file_path: None,
            data: Value::Null,
            request_id: None,
        }
    }

    /// Set the target document.
    #[must_use]
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Set the command arguments.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<Value>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// The document this request names, if any.
    #[must_use]
    pub fn target_path(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .or_else(|| self.data.get("file_path").and_then(Value::as_str))
    }
}

/// Reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command result, present on success (may be `null`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Echo of the request's correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

impl ControlResponse {
    /// A successful response.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            request_id: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            request_id: None,
        }
    }

    /// Attach the correlation id of the request being answered.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<Value>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Collapse into the result value or the error text.
    ///
    /// # Errors
    ///
    /// Returns the error text when `success` is false.
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}
