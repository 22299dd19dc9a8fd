//! Port discovery file shared between the bridge and its controllers.
//!
//! The bridge listens on an OS-assigned port and writes the number, as plain
//! decimal text, to a fixed location. Controllers started later read it back.
//! The file is overwritten on every bridge start.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// File name of the discovery file.
pub const DISCOVERY_FILE_NAME: &str = "luke_editor_mcp_port.txt";

/// Errors that can occur reading or writing the discovery file.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The file could not be read or written.
    #[error("Discovery file {path}: {source}")]
    Io {
        /// Path of the discovery file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file does not contain a usable port number.
    #[error("Discovery file {path} does not contain a valid port: {content:?}")]
    InvalidPort {
        /// Path of the discovery file.
        path: PathBuf,
        /// What was found instead.
        content: String,
    },
}

/// The well-known discovery file location.
///
/// `/tmp/luke_editor_mcp_port.txt` on Unix so that every process agrees on
/// it regardless of `TMPDIR`; the platform temp directory elsewhere.
#[must_use]
pub fn default_discovery_path() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/tmp").join(DISCOVERY_FILE_NAME)
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join(DISCOVERY_FILE_NAME)
    }
}

/// Overwrite the discovery file with `port`.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] if the file cannot be written.
pub fn write_port(path: &Path, port: u16) -> Result<(), DiscoveryError> {
    std::fs::write(path, port.to_string()).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the port from the discovery file.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] if the file cannot be read and
/// [`DiscoveryError::InvalidPort`] if it does not hold a non-zero port.
pub fn read_port(path: &Path) -> Result<u16, DiscoveryError> {
    let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match content.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(DiscoveryError::InvalidPort {
            path: path.to_path_buf(),
            content,
        }),
    }
}
