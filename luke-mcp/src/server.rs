//! MCP server implementation for Luke.
//!
//! Implements the JSON-RPC 2.0 side of MCP: handshake, tool listing and
//! tool calls, each tool call forwarded to the bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::BridgeClient;
use crate::config::McpConfig;
use crate::tools::{call_tool, get_available_tools};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported during `initialize`.
pub const SERVER_NAME: &str = "luke-editor-mcp";

/// JSON-RPC parse error.
pub const PARSE_ERROR: i32 = -32700;
/// JSON-RPC method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC invalid params.
pub const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID. Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Whether the sender expects no reply.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none() || self.method.starts_with("notifications/")
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID (matches request).
    pub id: Value,
    /// Result (on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// Input schema (JSON Schema).
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// MCP server exposing the Luke drawing tools.
///
/// Tool calls are serialized through one bridge client so the remembered
/// target document is shared by all of them.
pub struct McpServer {
    client: Mutex<BridgeClient>,
}

impl McpServer {
    /// Create a server around an existing client.
    #[must_use]
    pub fn new(client: BridgeClient) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Create a server that reaches the bridge as configured.
    #[must_use]
    pub fn from_config(config: &McpConfig) -> Self {
        Self::new(BridgeClient::new(config))
    }

    /// Handle one line of input from the MCP host.
    ///
    /// Returns `None` for notifications, which get no reply.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Unparseable MCP message: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        if request.is_notification() {
            tracing::debug!("MCP notification: {}", request.method);
            return None;
        }
        Some(self.handle_request(request).await)
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("MCP request: {} {:?}", request.method, request.params);
        let id = request.id.unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Self::handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => Self::handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, &request.params).await,

            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                },
                "capabilities": {
                    "tools": {}
                }
            }),
        )
    }

    fn handle_tools_list(id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({ "tools": get_available_tools() }))
    }

    /// Tool failures come back as a result with `isError` set. Only
    /// malformed calls are JSON-RPC errors.
    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = match params.get("arguments") {
            Some(Value::Null) | None => serde_json::json!({}),
            Some(arguments) => arguments.clone(),
        };

        let result = {
            let mut client = self.client.lock().await;
            call_tool(&mut client, name, arguments).await
        };

        let (text, is_error) = if result.success {
            let data = result.data.unwrap_or(Value::Null);
            (
                serde_json::to_string_pretty(&data).unwrap_or_default(),
                false,
            )
        } else {
            (result.error.unwrap_or_default(), true)
        };

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use luke_core::{ControlRequest, ControlResponse};
    use serde_json::json;

    use super::*;
    use crate::client::CommandTransport;
    use crate::error::ClientResult;

    struct FixedTransport(ControlResponse);

    #[async_trait]
    impl CommandTransport for FixedTransport {
        async fn round_trip(&mut self, _request: ControlRequest) -> ClientResult<ControlResponse> {
            Ok(self.0.clone())
        }
    }

    fn server_replying(response: ControlResponse) -> McpServer {
        McpServer::new(BridgeClient::with_transport(FixedTransport(response)))
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();

        assert_eq!(response.id, json!(1));
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "luke-editor-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 9);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let reply = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method not found: resources/list");
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server.handle_message("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_tool_call_result_is_text_content() {
        let server = server_replying(ControlResponse::success(
            json!({"file_path": "/docs/a.luke"}),
        ));
        let response = server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                id: Some(json!(3)),
                method: "tools/call".to_string(),
                params: json!({"name": "get_active_file"}),
            })
            .await;

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap();
        let data: Value = serde_json::from_str(text).unwrap();
        assert_eq!(data["file_path"], "/docs/a.luke");
    }

    #[tokio::test]
    async fn test_tool_failure_sets_is_error() {
        let server = server_replying(ControlResponse::failure("no active document"));
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_active_file"}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "no active document");
    }

    #[tokio::test]
    async fn test_tool_call_without_name() {
        let server = server_replying(ControlResponse::success(Value::Null));
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }
}
