//! # Control Channel Server
//!
//! Binds a loopback port, publishes it through the discovery file and serves:
//!
//! | route | purpose |
//! |---|---|
//! | `GET /` | controller WebSocket, one JSON command per text frame |
//! | `GET /surface?file_path=…` | rendering-surface WebSocket |
//! | `GET /health`, `/health/live`, `/health/ready` | health checks |
//! | `GET /metrics` | Prometheus scrape, when a recorder is installed |
//!
//! Every controller frame gets exactly one reply. Frames on one connection
//! are handled strictly in arrival order; connections are independent.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use luke_core::{discovery, ControlRequest, ControlResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use uuid::Uuid;

use crate::command::{self, Command};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, CommandError};
use crate::session::SessionManager;
use crate::validation::{loopback_host, validate_message_size};
use crate::{health, metrics, surface, AppState};

/// How long shutdown waits for the server task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running control channel server.
#[derive(Debug)]
pub struct ControlServer {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ControlServer {
    /// Bind, publish the port and start serving.
    ///
    /// # Errors
    ///
    /// Fails if the host is not a loopback address, the port cannot be bound
    /// or the discovery file cannot be written.
    pub async fn start(
        config: &BridgeConfig,
        sessions: SessionManager,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, BridgeError> {
        let ip = loopback_host(&config.host)
            .map_err(|_| BridgeError::NonLocalHost(config.host.clone()))?;
        let requested = SocketAddr::new(ip, config.port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: requested.to_string(),
                source,
            })?;
        let addr = listener.local_addr()?;

        discovery::write_port(&config.discovery_file, addr.port())?;
        tracing::info!(
            discovery_file = %config.discovery_file.display(),
            "Published port {}",
            addr.port()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState {
            sessions,
            shutdown: shutdown_rx.clone(),
            max_message_bytes: config.max_message_bytes,
        };
        let app = router(state, prometheus);

        let mut signal = shutdown_rx;
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Control server error: {e}");
            }
        });

        tracing::info!("Luke bridge listening on ws://{addr}");
        Ok(Self {
            addr,
            shutdown_tx,
            handle,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound port, as published in the discovery file.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// A receiver that turns `true` when shutdown starts.
    #[must_use]
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Close every connection and stop listening.
    ///
    /// The discovery file is left in place.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down control server");
        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.handle)
            .await
            .is_err()
        {
            tracing::warn!("Control server did not stop within {SHUTDOWN_TIMEOUT:?}");
        }
    }
}

/// Build the HTTP router.
pub fn router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new()
        .route("/", get(controller_handler))
        .route("/surface", get(surface::surface_handler))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness));

    if let Some(handle) = prometheus {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    )
    .with_state(state)
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "metrics", skip(handle))]
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Controller WebSocket handler.
#[tracing::instrument(name = "controller_connect", skip(ws, state))]
async fn controller_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_controller_socket(socket, state))
}

/// Serialize `value` and send it as a text frame. Returns `false` if the
/// connection is gone.
pub(crate) async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    value: &impl Serialize,
) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {e}");
            true
        }
    }
}

/// Send a Close frame telling the peer the bridge is going away.
pub(crate) async fn send_going_away(sender: &mut SplitSink<WebSocket, Message>) {
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: "bridge shutting down".into(),
    };
    let _ = sender.send(Message::Close(Some(frame))).await;
}

async fn handle_controller_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.shutdown.clone();
    let connection_id = Uuid::new_v4();

    metrics::inc_controller_connections();
    tracing::info!(%connection_id, "Controller connected");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    send_going_away(&mut sender).await;
                    break;
                }
            }

            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => handle_text(&state, text.as_str()).await,
                    Some(Ok(Message::Binary(_))) => {
                        metrics::record_validation_failure("binary_frame");
                        ControlResponse::failure("Binary frames are not supported")
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(%connection_id, "Controller disconnected");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(%connection_id, "Controller socket error: {e}");
                        break;
                    }
                };
                if !send_json(&mut sender, &reply).await {
                    break;
                }
            }
        }
    }

    metrics::dec_controller_connections();
    tracing::debug!(%connection_id, "Controller connection closed");
}

/// Turn one controller text frame into its reply.
async fn handle_text(state: &AppState, text: &str) -> ControlResponse {
    if let Err(e) = validate_message_size(text.len(), state.max_message_bytes) {
        tracing::warn!("Controller message rejected: {e}");
        metrics::record_validation_failure(e.kind());
        return ControlResponse::failure(e.to_string());
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            metrics::record_command("invalid", false);
            return ControlResponse::failure(format!("Invalid JSON: {e}"));
        }
    };
    let request_id = value.get("request_id").filter(|id| !id.is_null()).cloned();

    let request: ControlRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            let error = CommandError::InvalidMessage(e.to_string());
            metrics::record_command(error.kind(), false);
            return ControlResponse::failure(error.to_string()).with_request_id(request_id);
        }
    };

    tracing::debug!(command = %request.kind, "Received controller command");
    let response = match dispatch(&state.sessions, &request).await {
        Ok(result) => ControlResponse::success(result),
        Err(e) => {
            tracing::debug!(command = %request.kind, "Command failed: {e}");
            ControlResponse::failure(e.to_string())
        }
    };
    response.with_request_id(request.request_id)
}

/// Parse and execute a request.
///
/// # Errors
///
/// Returns the [`CommandError`] raised while parsing or executing.
pub async fn dispatch(
    sessions: &SessionManager,
    request: &ControlRequest,
) -> Result<Value, CommandError> {
    let command = match Command::parse(request) {
        Ok(command) => command,
        Err(e) => {
            metrics::record_command(e.kind(), false);
            return Err(e);
        }
    };
    let name = command.name();
    let result = command::execute(sessions, request.target_path(), command).await;
    metrics::record_command(name, result.is_ok());
    result
}
