//! MCP drawing tools.
//!
//! Every tool maps onto one bridge command of the same name.

use luke_core::protocol::{
    CLEAR_CANVAS, DELETE_ELEMENT, DRAW_CIRCLE, DRAW_RECTANGLE, DRAW_TEXT, GET_ACTIVE_FILE,
    GET_ELEMENTS, GET_ELEMENT_BY_ID, SET_FILE,
};
use luke_core::{Circle, Element, Rectangle, Text};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::BridgeClient;
use crate::server::Tool;
use crate::ToolResponse;

/// Parameters for the `set_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetFileParams {
    /// Absolute path of the document.
    pub file_path: String,
}

/// Parameters for the tools that address a single element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementIdParams {
    /// Element identifier.
    pub id: String,
}

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn id_property(what: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("Unique identifier for the {what} (generated when omitted)")
    })
}

fn color_property() -> Value {
    json!({
        "type": "string",
        "description": "Color as a CSS value, e.g. #ff0000 (default: #000000)"
    })
}

/// Definitions of every tool this server offers.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn get_available_tools() -> Vec<Tool> {
    vec![
        tool(
            GET_ACTIVE_FILE,
            "Get the currently active .luke file. Use this first before drawing to know which file to work with.",
            json!({ "type": "object", "properties": {} }),
        ),
        tool(
            SET_FILE,
            "Set the target .luke file to work with by opening it in the editor",
            json!({
                "type": "object",
                "required": ["file_path"],
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Absolute path to the .luke file"
                    }
                }
            }),
        ),
        tool(
            DRAW_CIRCLE,
            "Draw a circle on the canvas",
            json!({
                "type": "object",
                "required": ["x", "y", "radius"],
                "properties": {
                    "id": id_property("circle"),
                    "x": { "type": "number", "description": "X coordinate of the circle center" },
                    "y": { "type": "number", "description": "Y coordinate of the circle center" },
                    "radius": { "type": "number", "description": "Radius of the circle" },
                    "color": color_property()
                }
            }),
        ),
        tool(
            DRAW_RECTANGLE,
            "Draw a rectangle on the canvas",
            json!({
                "type": "object",
                "required": ["x", "y", "width", "height"],
                "properties": {
                    "id": id_property("rectangle"),
                    "x": { "type": "number", "description": "X coordinate of the top-left corner" },
                    "y": { "type": "number", "description": "Y coordinate of the top-left corner" },
                    "width": { "type": "number", "description": "Width of the rectangle" },
                    "height": { "type": "number", "description": "Height of the rectangle" },
                    "color": color_property()
                }
            }),
        ),
        tool(
            DRAW_TEXT,
            "Draw a text label on the canvas",
            json!({
                "type": "object",
                "required": ["x", "y", "content"],
                "properties": {
                    "id": id_property("text label"),
                    "x": { "type": "number", "description": "X coordinate of the text anchor" },
                    "y": { "type": "number", "description": "Y coordinate of the text anchor" },
                    "content": { "type": "string", "description": "Text to display" },
                    "fontSize": { "type": "number", "description": "Font size (default: 16)" },
                    "color": color_property()
                }
            }),
        ),
        tool(
            DELETE_ELEMENT,
            "Delete an element from the canvas by its ID",
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "string", "description": "ID of the element to delete" }
                }
            }),
        ),
        tool(
            CLEAR_CANVAS,
            "Remove every element from the canvas",
            json!({ "type": "object", "properties": {} }),
        ),
        tool(
            GET_ELEMENTS,
            "Get all elements drawn on the canvas",
            json!({ "type": "object", "properties": {} }),
        ),
        tool(
            GET_ELEMENT_BY_ID,
            "Get a specific element by its ID",
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "string", "description": "ID of the element to retrieve" }
                }
            }),
        ),
    ]
}

fn params<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolResponse> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolResponse::error(format!("Invalid parameters: {e}")))
}

/// Run the tool called `name` against the bridge.
pub async fn call_tool(client: &mut BridgeClient, name: &str, arguments: Value) -> ToolResponse {
    tracing::info!("Tool call: {}", name);

    let outcome = match name {
        GET_ACTIVE_FILE => client.get_active_file().await,
        SET_FILE => match params::<SetFileParams>(arguments) {
            Ok(p) => client.set_file(&p.file_path).await,
            Err(response) => return response,
        },
        DRAW_CIRCLE => match params::<Circle>(arguments) {
            Ok(circle) => client.draw(&Element::Circle(circle)).await,
            Err(response) => return response,
        },
        DRAW_RECTANGLE => match params::<Rectangle>(arguments) {
            Ok(rectangle) => client.draw(&Element::Rectangle(rectangle)).await,
            Err(response) => return response,
        },
        DRAW_TEXT => match params::<Text>(arguments) {
            Ok(text) => client.draw(&Element::Text(text)).await,
            Err(response) => return response,
        },
        DELETE_ELEMENT => match params::<ElementIdParams>(arguments) {
            Ok(p) => client.delete_element(&p.id).await,
            Err(response) => return response,
        },
        CLEAR_CANVAS => client.clear_canvas().await,
        GET_ELEMENTS => client.get_elements().await,
        GET_ELEMENT_BY_ID => match params::<ElementIdParams>(arguments) {
            Ok(p) => client.get_element_by_id(&p.id).await,
            Err(response) => return response,
        },
        _ => return ToolResponse::error(format!("Unknown tool: {name}")),
    };

    match outcome {
        Ok(data) => ToolResponse::success(data),
        Err(e) => {
            tracing::warn!("Tool {} failed: {}", name, e);
            ToolResponse::error(e.to_string())
        }
    }
}
