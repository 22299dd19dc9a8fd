//! # Luke MCP
//!
//! MCP (Model Context Protocol) tools that draw on Luke canvas documents.
//! Tool calls are forwarded to a running Luke bridge over its controller
//! WebSocket; the bridge port comes from the discovery file.
//!
//! ## MCP Tools
//!
//! - `get_active_file` / `set_file` - Choose the document to draw on
//! - `draw_circle`, `draw_rectangle`, `draw_text` - Add elements
//! - `delete_element`, `clear_canvas` - Remove elements
//! - `get_elements`, `get_element_by_id` - Inspect the document

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod tools;

// Re-export key types for convenience
pub use client::{BridgeClient, CommandTransport, WsTransport};
pub use config::{CliArgs, McpConfig};
pub use error::{ClientError, ClientResult};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};

use serde::{Deserialize, Serialize};

/// MCP tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result data (if successful).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
