//! Controller channel integration tests.
//!
//! Drives a real bridge over WebSocket the way an automation agent would.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use luke_core::{codec, discovery};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use common::{connect, recv_json, request, send_json, TestServer};

#[tokio::test]
async fn discovery_file_holds_bound_port() {
    let server = TestServer::start().await;

    let port = discovery::read_port(&server.discovery_file()).expect("read port");
    assert_eq!(port, server.port());
    assert_ne!(port, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn set_file_draw_and_read_back() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    let doc = server.doc_str("scene.luke");

    let reply = request(&mut ws, &json!({"type": "set_file", "file_path": doc})).await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["result"]["status"], "success");
    assert_eq!(reply["result"]["file_path"], doc);

    let reply = request(
        &mut ws,
        &json!({"type": "draw_circle", "data": {"x": 10, "y": 10, "radius": 5}}),
    )
    .await;
    assert_eq!(reply["success"], true, "reply: {reply}");
    assert_eq!(reply["result"]["type"], "circle");
    assert_eq!(reply["result"]["color"], "#000000");
    let id = reply["result"]["id"].as_str().expect("generated id").to_string();
    assert!(!id.is_empty());

    let reply = request(&mut ws, &json!({"type": "get_elements"})).await;
    let elements = reply["result"].as_array().expect("array");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0]["id"], id.as_str());
    assert_eq!(elements[0]["radius"], 5.0);

    // The document on disk holds the same element.
    let text = std::fs::read_to_string(server.doc("scene.luke")).expect("document written");
    let persisted = codec::decode(&text);
    assert_eq!(persisted.elements.len(), 1);
    assert_eq!(persisted.elements[0].id().as_str(), id);

    server.shutdown().await;
}

#[tokio::test]
async fn get_active_file_reports_path() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;

    let reply = request(&mut ws, &json!({"type": "get_active_file"})).await;
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "no active document");

    let doc = server.doc_str("active.luke");
    request(&mut ws, &json!({"type": "set_file", "data": {"file_path": doc}})).await;
    let reply = request(&mut ws, &json!({"type": "get_active_file"})).await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["result"]["file_path"], doc);

    server.shutdown().await;
}

#[tokio::test]
async fn draw_without_active_document_fails() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;

    let reply = request(
        &mut ws,
        &json!({"type": "draw_rectangle", "data": {"x": 0, "y": 0, "width": 4, "height": 2}}),
    )
    .await;
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "no active document");

    server.shutdown().await;
}

#[tokio::test]
async fn explicit_path_does_not_need_active_document() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    let doc = server.doc_str("explicit.luke");

    let reply = request(
        &mut ws,
        &json!({
            "type": "draw_text",
            "file_path": doc,
            "data": {"id": "t1", "x": 5, "y": 6, "content": "hello", "fontSize": 20}
        }),
    )
    .await;
    assert_eq!(reply["success"], true, "reply: {reply}");
    assert_eq!(reply["result"]["fontSize"], 20.0);

    let reply = request(
        &mut ws,
        &json!({"type": "get_element_by_id", "file_path": doc, "data": {"id": "t1"}}),
    )
    .await;
    assert_eq!(reply["result"]["content"], "hello");

    // Still no active document.
    let reply = request(&mut ws, &json!({"type": "get_active_file"})).await;
    assert_eq!(reply["success"], false);

    server.shutdown().await;
}

#[tokio::test]
async fn missing_element_is_null_not_error() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    request(
        &mut ws,
        &json!({"type": "set_file", "file_path": server.doc_str("a.luke")}),
    )
    .await;

    let reply = request(
        &mut ws,
        &json!({"type": "get_element_by_id", "data": {"id": "nope"}}),
    )
    .await;
    assert_eq!(reply["success"], true);
    assert!(reply.get("result").is_some(), "result key must be present");
    assert!(reply["result"].is_null());

    server.shutdown().await;
}

#[tokio::test]
async fn delete_and_clear() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    request(
        &mut ws,
        &json!({"type": "set_file", "file_path": server.doc_str("a.luke")}),
    )
    .await;
    for id in ["a", "b", "c"] {
        let reply = request(
            &mut ws,
            &json!({"type": "draw_circle", "data": {"id": id, "x": 1, "y": 1, "radius": 1}}),
        )
        .await;
        assert_eq!(reply["success"], true);
    }

    let reply = request(&mut ws, &json!({"type": "delete_element", "data": {"id": "b"}})).await;
    assert_eq!(reply["result"], json!({"id": "b", "deleted": true}));

    let reply = request(&mut ws, &json!({"type": "delete_element", "data": {"id": "b"}})).await;
    assert_eq!(reply["result"], json!({"id": "b", "deleted": false}));

    let reply = request(&mut ws, &json!({"type": "clear_canvas"})).await;
    assert_eq!(reply["result"], json!({"cleared": 2}));

    let reply = request(&mut ws, &json!({"type": "get_elements"})).await;
    assert_eq!(reply["result"], json!([]));

    server.shutdown().await;
}

#[tokio::test]
async fn redraw_with_same_id_replaces() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    request(
        &mut ws,
        &json!({"type": "set_file", "file_path": server.doc_str("a.luke")}),
    )
    .await;

    for radius in [1, 9] {
        request(
            &mut ws,
            &json!({"type": "draw_circle", "data": {"id": "c", "x": 0, "y": 0, "radius": radius}}),
        )
        .await;
    }
    let reply = request(&mut ws, &json!({"type": "get_elements"})).await;
    let elements = reply["result"].as_array().expect("array");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0]["radius"], 9.0);

    server.shutdown().await;
}

#[tokio::test]
async fn errors_keep_connection_open() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;

    let reply = request(&mut ws, &json!({"type": "explode"})).await;
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "Unknown command type: explode");

    ws.send(Message::Text("{not json".to_string()))
        .await
        .expect("send");
    let reply = recv_json(&mut ws).await.expect("reply");
    assert_eq!(reply["success"], false);
    assert!(reply["error"].as_str().expect("error").contains("Invalid JSON"));

    let reply = request(&mut ws, &json!({"data": {}})).await;
    assert_eq!(reply["success"], false);

    ws.send(Message::Binary(vec![1, 2, 3])).await.expect("send");
    let reply = recv_json(&mut ws).await.expect("reply");
    assert_eq!(reply["success"], false);

    let reply = request(
        &mut ws,
        &json!({"type": "set_file", "file_path": "relative/path.luke"}),
    )
    .await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"]
        .as_str()
        .expect("error")
        .contains("must be absolute"));

    let reply = request(
        &mut ws,
        &json!({"type": "draw_circle", "file_path": server.doc_str("a.luke"),
                "data": {"x": 0, "y": 0, "radius": -1}}),
    )
    .await;
    assert_eq!(reply["success"], false);
    assert!(!server.doc("a.luke").exists(), "invalid element must not be written");

    // Still usable afterwards.
    let reply = request(
        &mut ws,
        &json!({"type": "set_file", "file_path": server.doc_str("a.luke")}),
    )
    .await;
    assert_eq!(reply["success"], true);

    server.shutdown().await;
}

#[tokio::test]
async fn oversize_message_is_rejected() {
    let server = TestServer::start_with(|config| config.max_message_bytes = 1024).await;
    let mut ws = connect(&server.ws_url()).await;

    let big = "x".repeat(4096);
    let reply = request(&mut ws, &json!({"type": "get_elements", "data": {"pad": big}})).await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"].as_str().expect("error").contains("too large"));

    server.shutdown().await;
}

#[tokio::test]
async fn request_id_is_echoed() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;

    let reply = request(&mut ws, &json!({"type": "get_active_file", "request_id": "abc"})).await;
    assert_eq!(reply["request_id"], "abc");

    let reply = request(&mut ws, &json!({"type": "bogus", "request_id": 42})).await;
    assert_eq!(reply["request_id"], 42);

    let reply = request(&mut ws, &json!({"type": "get_active_file"})).await;
    assert!(reply.get("request_id").is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn pipelined_commands_are_answered_in_order() {
    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url()).await;
    request(
        &mut ws,
        &json!({"type": "set_file", "file_path": server.doc_str("a.luke")}),
    )
    .await;

    for i in 0..20 {
        send_json(
            &mut ws,
            &json!({"type": "draw_circle", "request_id": i,
                    "data": {"id": format!("c{i}"), "x": i, "y": 0, "radius": 1}}),
        )
        .await;
    }
    for i in 0..20 {
        let reply = recv_json(&mut ws).await.expect("reply");
        assert_eq!(reply["request_id"], i);
        assert_eq!(reply["result"]["id"], format!("c{i}"));
    }

    let reply = request(&mut ws, &json!({"type": "get_elements"})).await;
    let ids: Vec<_> = reply["result"]
        .as_array()
        .expect("array")
        .iter()
        .map(|e| e["id"].as_str().unwrap_or_default().to_string())
        .collect();
    let expected: Vec<_> = (0..20).map(|i| format!("c{i}")).collect();
    assert_eq!(ids, expected);

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_controllers_share_state() {
    let server = TestServer::start().await;
    let mut first = connect(&server.ws_url()).await;
    let mut second = connect(&server.ws_url()).await;

    request(
        &mut first,
        &json!({"type": "set_file", "file_path": server.doc_str("shared.luke")}),
    )
    .await;
    request(
        &mut first,
        &json!({"type": "draw_circle", "data": {"id": "c1", "x": 0, "y": 0, "radius": 2}}),
    )
    .await;

    let reply = request(&mut second, &json!({"type": "get_element_by_id", "data": {"id": "c1"}})).await;
    assert_eq!(reply["result"]["id"], "c1");

    server.shutdown().await;
}

#[tokio::test]
async fn health_endpoints() {
    let server = TestServer::start().await;

    let (status, _) = server.http_get("/health/live").await;
    assert_eq!(status, 200);

    let (status, body) = server.http_get("/health/ready").await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["open_sessions"], 0);

    let (status, _) = server.http_get("/health").await;
    assert_eq!(status, 200);

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_controller_connections() {
    let server = TestServer::start().await;
    let discovery_file = server.discovery_file();
    let mut ws = connect(&server.ws_url()).await;
    // Make sure the connection is fully established server-side.
    request(&mut ws, &json!({"type": "get_elements", "file_path": server.doc_str("a.luke")})).await;

    let _dir = server.shutdown_keeping_files().await;

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("close within timeout");
    match frame {
        Some(Ok(Message::Close(Some(close)))) => assert_eq!(close.code, CloseCode::Away),
        other => panic!("expected close frame, got {other:?}"),
    }

    // The discovery file is left as it was.
    assert!(discovery_file.exists());
}
