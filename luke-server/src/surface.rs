//! Rendering-surface WebSocket endpoint.
//!
//! A surface connects to `/surface?file_path=…`, receives the document's
//! elements as its first `update`, then every later update. It may send
//! mutations of its own document and `focus` to make that document active:
//!
//! ```json
//! {"type": "draw_rectangle", "data": {"x": 0, "y": 0, "width": 10, "height": 5}}
//! {"type": "delete_element", "data": {"id": "r1"}}
//! {"type": "focus"}
//! ```
//!
//! Successful mutations are acknowledged by the resulting `update`; failures
//! come back as `{"type": "error", "data": {"message": …}}`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::StreamExt;
use luke_core::ControlRequest;
use serde::Deserialize;

use crate::command::Command;
use crate::control::{send_going_away, send_json};
use crate::session::{SurfaceHandle, SurfaceMessage};
use crate::validation::validate_message_size;
use crate::{metrics, AppState};

/// Message type that makes the surface's document active.
pub const FOCUS: &str = "focus";

/// Query parameters of the surface endpoint.
#[derive(Debug, Deserialize)]
pub struct SurfaceParams {
    /// Document to attach to.
    pub file_path: Option<String>,
}

/// Rendering-surface WebSocket handler.
#[tracing::instrument(name = "surface_connect", skip(ws, state))]
pub async fn surface_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SurfaceParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_surface_socket(socket, params.file_path, state))
}

async fn handle_surface_socket(socket: WebSocket, file_path: Option<String>, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.shutdown.clone();

    let (handle, mut updates) = SurfaceHandle::channel();
    let surface_id = handle.id();
    let attached = match file_path {
        Some(file_path) => state
            .sessions
            .open_session(&file_path, handle)
            .await
            .map_err(|e| e.to_string()),
        None => Err("Missing required query parameter: file_path".to_string()),
    };
    let attachment = match attached {
        Ok(attachment) => attachment,
        Err(message) => {
            tracing::warn!(%surface_id, "Surface rejected: {message}");
            send_json(&mut sender, &SurfaceMessage::Error { message }).await;
            let _ = futures::SinkExt::close(&mut sender).await;
            return;
        }
    };
    let path = attachment.path.clone();
    let path_text = path.to_string_lossy().into_owned();

    metrics::inc_surface_connections();
    tracing::info!(%surface_id, path = %path.display(), "Surface connected");

    let initial = SurfaceMessage::Update {
        elements: attachment.elements,
    };
    if send_json(&mut sender, &initial).await {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        send_going_away(&mut sender).await;
                        break;
                    }
                }

                update = updates.recv() => {
                    let Some(update) = update else { break };
                    if !send_json(&mut sender, &update).await {
                        break;
                    }
                }

                msg = receiver.next() => {
                    let reply = match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_surface_text(&state, &path_text, text.as_str()).await
                        }
                        Some(Ok(Message::Binary(_))) => Some(SurfaceMessage::Error {
                            message: "Binary frames are not supported".to_string(),
                        }),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => None,
                        Some(Err(e)) => {
                            tracing::warn!(%surface_id, "Surface socket error: {e}");
                            break;
                        }
                    };
                    if let Some(reply) = reply {
                        if !send_json(&mut sender, &reply).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    state.sessions.close_surface(&path, surface_id).await;
    metrics::dec_surface_connections();
    tracing::info!(%surface_id, path = %path.display(), "Surface disconnected");
}

/// Apply one surface message. Returns the reply to send, if any.
async fn handle_surface_text(state: &AppState, path: &str, text: &str) -> Option<SurfaceMessage> {
    let error = |message: String| Some(SurfaceMessage::Error { message });

    if let Err(e) = validate_message_size(text.len(), state.max_message_bytes) {
        metrics::record_validation_failure(e.kind());
        return error(e.to_string());
    }
    let request: ControlRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => return error(format!("Invalid message: {e}")),
    };

    if request.kind == FOCUS {
        return match state.sessions.set_active_path(path).await {
            Ok(_) => {
                metrics::record_command(FOCUS, true);
                None
            }
            Err(e) => {
                metrics::record_command(FOCUS, false);
                error(e.to_string())
            }
        };
    }

    let command = match Command::parse(&request) {
        Ok(command) => command,
        Err(e) => return error(e.to_string()),
    };
    let name = command.name();
    let Some(mutation) = command.into_mutation() else {
        return error(format!("Unsupported surface message type: {name}"));
    };

    match state.sessions.apply_mutation(Some(path), mutation).await {
        Ok(_) => {
            metrics::record_command(name, true);
            None
        }
        Err(e) => {
            metrics::record_command(name, false);
            tracing::debug!(command = name, "Surface mutation failed: {e}");
            error(e.to_string())
        }
    }
}
