//! Error types for the bridge client.

use std::time::Duration;

use luke_core::DiscoveryError;
use thiserror::Error;

/// Errors raised while driving the bridge.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The bridge port could not be discovered.
    #[error("Luke bridge not found. Make sure it is running: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The WebSocket handshake failed.
    #[error("Failed to connect to Luke bridge on port {port}: {source}")]
    Connect {
        /// Port that was tried.
        port: u16,
        /// Underlying WebSocket error.
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    /// The connection broke mid-exchange.
    #[error("Failed to communicate with Luke bridge: {0}")]
    Transport(String),

    /// No reply arrived in time.
    #[error("Luke bridge did not reply within {0:?}")]
    Timeout(Duration),

    /// A frame could not be encoded or decoded.
    #[error("Invalid message exchanged with Luke bridge: {0}")]
    Json(#[from] serde_json::Error),

    /// A document command was issued before any document was chosen.
    #[error("No file path set. Call set_file first.")]
    NoFilePath,

    /// The bridge executed the command and reported a failure.
    #[error("{0}")]
    Remote(String),
}

impl ClientError {
    /// Whether the connection should be dropped after this error.
    #[must_use]
    pub const fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Transport(_) | Self::Timeout(_) | Self::Json(_)
        )
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
