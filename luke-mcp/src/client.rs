//! Client side of the bridge's controller channel.
//!
//! The bridge is found through its discovery file and reached over a
//! loopback WebSocket. Nothing is opened until the first command; a broken
//! connection is dropped and re-established (with a fresh discovery) on the
//! next one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use luke_core::discovery::read_port;
use luke_core::protocol::{
    CLEAR_CANVAS, DELETE_ELEMENT, DRAW_CIRCLE, DRAW_RECTANGLE, DRAW_TEXT, GET_ACTIVE_FILE,
    GET_ELEMENTS, GET_ELEMENT_BY_ID, SET_FILE,
};
use luke_core::{ControlRequest, ControlResponse, Element};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::McpConfig;
use crate::error::{ClientError, ClientResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sends one request and yields its reply.
#[async_trait]
pub trait CommandTransport: Send {
    /// Exchange a request for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the bridge cannot be reached or does
    /// not answer.
    async fn round_trip(&mut self, request: ControlRequest) -> ClientResult<ControlResponse>;
}

/// WebSocket transport with lazy connect and reconnect.
pub struct WsTransport {
    discovery_file: PathBuf,
    port: Option<u16>,
    request_timeout: Duration,
    socket: Option<Socket>,
    next_request_id: u64,
}

impl WsTransport {
    /// Create a disconnected transport.
    #[must_use]
    pub fn new(config: &McpConfig) -> Self {
        Self {
            discovery_file: config.discovery_file.clone(),
            port: config.port,
            request_timeout: config.request_timeout,
            socket: None,
            next_request_id: 1,
        }
    }
}

async fn connect(
    discovery_file: &Path,
    port: Option<u16>,
    request_timeout: Duration,
) -> ClientResult<Socket> {
    let port = match port {
        Some(port) => port,
        None => read_port(discovery_file)?,
    };
    let url = format!("ws://127.0.0.1:{port}/");

    let (socket, _) = timeout(request_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| ClientError::Timeout(request_timeout))?
        .map_err(|source| ClientError::Connect {
            port,
            source: Box::new(source),
        })?;

    tracing::info!("Connected to Luke bridge at {}", url);
    Ok(socket)
}

#[async_trait]
impl CommandTransport for WsTransport {
    async fn round_trip(&mut self, mut request: ControlRequest) -> ClientResult<ControlResponse> {
        if self.socket.is_none() {
            let socket = connect(&self.discovery_file, self.port, self.request_timeout).await?;
            self.socket = Some(socket);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        request.request_id = Some(Value::from(request_id));

        let request_timeout = self.request_timeout;
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| ClientError::Transport("not connected".to_string()))?;

        let result = match timeout(request_timeout, exchange(socket, &request, request_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(request_timeout)),
        };

        if let Err(e) = &result {
            if e.breaks_connection() {
                tracing::warn!("Dropping bridge connection: {}", e);
                self.socket = None;
            }
        }
        result
    }
}

async fn exchange(
    socket: &mut Socket,
    request: &ControlRequest,
    request_id: u64,
) -> ClientResult<ControlResponse> {
    let text = serde_json::to_string(request)?;
    socket
        .send(Message::Text(text))
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;

    while let Some(frame) = socket.next().await {
        match frame.map_err(|e| ClientError::Transport(e.to_string()))? {
            Message::Text(text) => {
                let response: ControlResponse = serde_json::from_str(&text)?;
                match &response.request_id {
                    Some(id) if id.as_u64() != Some(request_id) => {
                        tracing::debug!("Skipping reply to request {}", id);
                    }
                    _ => return Ok(response),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(ClientError::Transport("connection closed by bridge".to_string()))
}

/// Drawing API over the controller channel.
///
/// Remembers the document chosen with [`Self::set_file`] or reported by
/// [`Self::get_active_file`] and targets it with every document command.
pub struct BridgeClient {
    transport: Box<dyn CommandTransport>,
    file_path: Option<String>,
}

impl BridgeClient {
    /// Create a client that talks WebSocket to the configured bridge.
    #[must_use]
    pub fn new(config: &McpConfig) -> Self {
        Self::with_transport(WsTransport::new(config))
    }

    /// Create a client over any transport.
    #[must_use]
    pub fn with_transport(transport: impl CommandTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            file_path: None,
        }
    }

    /// The remembered target document.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    /// Send a raw request and unwrap its result.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the bridge reports a failure, or
    /// a transport error.
    pub async fn send(&mut self, request: ControlRequest) -> ClientResult<Value> {
        tracing::debug!("Sending {} to bridge", request.kind);
        self.transport
            .round_trip(request)
            .await?
            .into_result()
            .map_err(ClientError::Remote)
    }

    /// Ask the bridge which document is active and remember it.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn get_active_file(&mut self) -> ClientResult<Value> {
        let result = self.send(ControlRequest::new(GET_ACTIVE_FILE)).await?;
        if let Some(path) = result.get("file_path").and_then(Value::as_str) {
            self.file_path = Some(path.to_string());
        }
        Ok(result)
    }

    /// Open a document on the bridge and target it from now on.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn set_file(&mut self, file_path: &str) -> ClientResult<Value> {
        let result = self
            .send(ControlRequest::new(SET_FILE).with_file_path(file_path))
            .await?;
        let resolved = result
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or(file_path);
        self.file_path = Some(resolved.to_string());
        Ok(result)
    }

    /// Add an element to the target document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoFilePath`] when no document is known, else
    /// see [`Self::send`].
    pub async fn draw(&mut self, element: &Element) -> ClientResult<Value> {
        let (kind, data) = match element {
            Element::Circle(circle) => (DRAW_CIRCLE, serde_json::to_value(circle)?),
            Element::Rectangle(rectangle) => (DRAW_RECTANGLE, serde_json::to_value(rectangle)?),
            Element::Text(text) => (DRAW_TEXT, serde_json::to_value(text)?),
        };
        self.document_command(kind, data).await
    }

    /// Remove an element from the target document.
    ///
    /// # Errors
    ///
    /// See [`Self::draw`].
    pub async fn delete_element(&mut self, id: &str) -> ClientResult<Value> {
        self.document_command(DELETE_ELEMENT, json!({ "id": id })).await
    }

    /// Remove every element from the target document.
    ///
    /// # Errors
    ///
    /// See [`Self::draw`].
    pub async fn clear_canvas(&mut self) -> ClientResult<Value> {
        self.document_command(CLEAR_CANVAS, Value::Null).await
    }

    /// List the elements of the target document.
    ///
    /// # Errors
    ///
    /// See [`Self::draw`].
    pub async fn get_elements(&mut self) -> ClientResult<Value> {
        let result = self.document_command(GET_ELEMENTS, Value::Null).await?;
        Ok(if result.is_array() { result } else { json!([]) })
    }

    /// Look up one element of the target document.
    ///
    /// # Errors
    ///
    /// See [`Self::draw`].
    pub async fn get_element_by_id(&mut self, id: &str) -> ClientResult<Value> {
        self.document_command(GET_ELEMENT_BY_ID, json!({ "id": id })).await
    }

    async fn document_command(&mut self, kind: &str, data: Value) -> ClientResult<Value> {
        let file_path = self.file_path.clone().ok_or(ClientError::NoFilePath)?;
        self.send(
            ControlRequest::new(kind)
                .with_file_path(file_path)
                .with_data(data),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use luke_core::Circle;

    use super::*;

    /// Replays canned responses and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        sent: Arc<Mutex<Vec<ControlRequest>>>,
        replies: VecDeque<ClientResult<ControlResponse>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<ClientResult<ControlResponse>>) -> Self {
            Self {
                sent: Arc::default(),
                replies: replies.into(),
            }
        }
    }

    #[async_trait]
    impl CommandTransport for ScriptedTransport {
        async fn round_trip(&mut self, request: ControlRequest) -> ClientResult<ControlResponse> {
            self.sent.lock().unwrap().push(request);
            self.replies
                .pop_front()
                .unwrap_or_else(|| Ok(ControlResponse::success(Value::Null)))
        }
    }

    fn circle(id: &str) -> Element {
        Element::Circle(Circle {
            id: id.into(),
            x: 1.0,
            y: 2.0,
            radius: 3.0,
            color: "#ff0000".to_string(),
        })
    }

    #[tokio::test]
    async fn test_draw_without_file_sends_nothing() {
        let transport = ScriptedTransport::default();
        let sent = Arc::clone(&transport.sent);
        let mut client = BridgeClient::with_transport(transport);

        let err = client.draw(&circle("c1")).await.unwrap_err();
        assert!(matches!(err, ClientError::NoFilePath));
        assert!(client.get_elements().await.is_err());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_file_targets_later_commands() {
        let transport = ScriptedTransport::replying(vec![Ok(ControlResponse::success(
            json!({"status": "success", "file_path": "/docs/a.luke"}),
        ))]);
        let sent = Arc::clone(&transport.sent);
        let mut client = BridgeClient::with_transport(transport);

        client.set_file("/docs/./a.luke").await.unwrap();
        assert_eq!(client.file_path(), Some("/docs/a.luke"));

        client.draw(&circle("c1")).await.unwrap();
        client.delete_element("c1").await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].kind, "set_file");
        assert_eq!(sent[0].file_path.as_deref(), Some("/docs/./a.luke"));
        assert_eq!(sent[1].kind, "draw_circle");
        assert_eq!(sent[1].file_path.as_deref(), Some("/docs/a.luke"));
        assert_eq!(sent[1].data["radius"], 3.0);
        assert_eq!(sent[2].kind, "delete_element");
        assert_eq!(sent[2].data, json!({"id": "c1"}));
    }

    #[tokio::test]
    async fn test_failed_set_file_keeps_previous_target() {
        let transport = ScriptedTransport::replying(vec![
            Ok(ControlResponse::success(json!({"file_path": "/docs/a.luke"}))),
            Ok(ControlResponse::failure("file_path must be absolute")),
        ]);
        let mut client = BridgeClient::with_transport(transport);

        client.get_active_file().await.unwrap();
        let err = client.set_file("relative.luke").await.unwrap_err();
        assert_eq!(err.to_string(), "file_path must be absolute");
        assert_eq!(client.file_path(), Some("/docs/a.luke"));
    }

    #[tokio::test]
    async fn test_get_active_file_without_document() {
        let transport =
            ScriptedTransport::replying(vec![Ok(ControlResponse::failure("no active document"))]);
        let mut client = BridgeClient::with_transport(transport);

        let err = client.get_active_file().await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref msg) if msg == "no active document"));
        assert_eq!(client.file_path(), None);
    }

    #[tokio::test]
    async fn test_get_elements_normalizes_non_array() {
        let transport = ScriptedTransport::replying(vec![
            Ok(ControlResponse::success(json!({"file_path": "/docs/a.luke"}))),
            Ok(ControlResponse::success(Value::Null)),
        ]);
        let mut client = BridgeClient::with_transport(transport);

        client.get_active_file().await.unwrap();
        assert_eq!(client.get_elements().await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let transport = ScriptedTransport::replying(vec![Err(ClientError::Transport(
            "connection reset".to_string(),
        ))]);
        let mut client = BridgeClient::with_transport(transport);

        let err = client.get_active_file().await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_ws_transport_without_discovery_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = McpConfig {
            discovery_file: dir.path().join("missing.txt"),
            ..McpConfig::default()
        };
        let mut transport = WsTransport::new(&config);

        let err = transport
            .round_trip(ControlRequest::new(GET_ACTIVE_FILE))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Discovery(_)));
        assert!(transport.socket.is_none());
    }

    #[tokio::test]
    async fn test_ws_transport_connection_refused() {
        // Bind then release a port so nothing is listening on it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = McpConfig {
            port: Some(port),
            ..McpConfig::default()
        };
        let mut transport = WsTransport::new(&config);

        let err = transport
            .round_trip(ControlRequest::new(GET_ACTIVE_FILE))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { port: p, .. } if p == port));
        assert!(transport.socket.is_none());
    }
}
