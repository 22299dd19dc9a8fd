//! # Luke Bridge Server
//!
//! Lets a process outside the editor drive a Luke canvas document over a
//! local WebSocket while rendering surfaces stay in sync.
//!
//! ```text
//! controller ──ws──▶ ControlServer ──▶ SessionManager ──▶ ElementStore
//!                                          │    ▲             │
//!                     surfaces ◀──update───┘    │          codec
//!                                               │             ▼
//!                               DocumentWatcher ◀──────── document file
//! ```
//!
//! This library is used by both the `luke-bridge` binary and the integration
//! tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod health;
pub mod metrics;
pub mod session;
pub mod storage;
pub mod surface;
pub mod validation;
pub mod watcher;

pub use config::{BridgeConfig, CliArgs};
pub use control::ControlServer;
pub use error::{BridgeError, CommandError, SessionError, SessionResult};
pub use session::{
    Mutation, MutationOutcome, SessionManager, SurfaceAttachment, SurfaceHandle, SurfaceId,
    SurfaceMessage,
};
pub use storage::{DocumentStorage, FsStorage};
pub use watcher::DocumentWatcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Document sessions.
    pub sessions: SessionManager,
    /// Turns `true` when the server is shutting down.
    pub shutdown: watch::Receiver<bool>,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_bytes: usize,
}

/// A running bridge: control server, session manager and file watcher.
#[derive(Debug)]
pub struct Bridge {
    server: ControlServer,
    sessions: SessionManager,
    resync: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Start a bridge backed by the local filesystem.
    ///
    /// # Errors
    ///
    /// Fails if the watcher cannot be created or the server cannot start.
    pub async fn start(
        config: BridgeConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, BridgeError> {
        let storage: Arc<dyn DocumentStorage> = Arc::new(FsStorage::new());
        let mut sessions = SessionManager::new(storage);

        let changes = if config.watch_files {
            let (watcher, changes) = DocumentWatcher::new()?;
            sessions = sessions.with_watcher(Arc::new(watcher));
            Some(changes)
        } else {
            None
        };

        let server = ControlServer::start(&config, sessions.clone(), prometheus).await?;
        let resync = changes.map(|changes| {
            watcher::spawn_resync_task(
                sessions.clone(),
                changes,
                config.watch_debounce,
                server.subscribe_shutdown(),
            )
        });

        Ok(Self {
            server,
            sessions,
            resync,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    /// The bound port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// The session manager serving this bridge.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Close every connection, stop the watcher and stop listening.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
        if let Some(resync) = self.resync {
            let _ = resync.await;
        }
    }
}
