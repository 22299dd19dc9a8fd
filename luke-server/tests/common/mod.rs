//! Shared helpers for integration tests.

#![allow(dead_code)]

mod server;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

pub use server::TestServer;

/// Client side of a WebSocket connection.
pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect a WebSocket client to `url`.
pub async fn connect(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("Failed to connect");
    socket
}

/// Receive and parse a JSON message with timeout.
pub async fn recv_json(socket: &mut Socket) -> Option<Value> {
    let msg = timeout(Duration::from_secs(5), socket.next())
        .await
        .ok()??
        .ok()?;

    match msg {
        Message::Text(text) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Assert that nothing arrives within `wait`.
pub async fn assert_silent(socket: &mut Socket, wait: Duration) {
    if let Ok(Some(Ok(msg))) = timeout(wait, socket.next()).await {
        panic!("unexpected message: {msg:?}");
    }
}

/// Send a JSON message.
pub async fn send_json(socket: &mut Socket, value: &Value) {
    let text = serde_json::to_string(value).expect("serialize");
    socket
        .send(Message::Text(text))
        .await
        .expect("send failed");
}

/// Send a command and wait for its reply.
pub async fn request(socket: &mut Socket, value: &Value) -> Value {
    send_json(socket, value).await;
    recv_json(socket).await.expect("no reply")
}

/// Poll `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
