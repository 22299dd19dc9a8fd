//! Error types for the control bridge.

use std::path::PathBuf;

use luke_core::{CoreError, DiscoveryError};
use thiserror::Error;

/// Errors raised by the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A command needed the active document and none is set.
    #[error("no active document")]
    NoActiveDocument,

    /// The document path was rejected.
    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath {
        /// Path as supplied.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Reading the document failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Persisting the document failed. The in-memory state is unchanged.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Element validation or encoding failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors produced while interpreting a controller or surface command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The `type` field named no known command.
    #[error("Unknown command type: {0}")]
    UnknownCommand(String),

    /// A required field was absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The command data could not be interpreted.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The frame was not a well-formed command.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The session manager rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CommandError {
    /// Short machine-readable category.
    ///
    /// Recorded as the command label of requests rejected before a command
    /// could be parsed.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingField(_) => "missing_field",
            Self::InvalidData(_) => "invalid_data",
            Self::InvalidMessage(_) => "invalid_message",
            Self::Session(SessionError::NoActiveDocument) => "no_active_document",
            Self::Session(SessionError::InvalidPath { .. }) => "invalid_path",
            Self::Session(SessionError::Read { .. } | SessionError::Write { .. }) => "io",
            Self::Session(SessionError::Core(_)) => "invalid_element",
        }
    }
}

/// Errors that stop the bridge from starting.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The configured host is not a loopback address.
    #[error("Refusing to bind non-loopback host '{0}'")]
    NonLocalHost(String),

    /// Binding the listener failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the discovery file failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Setting up the file watcher failed.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
