//! Input validation for untrusted data.
//!
//! Everything a controller or surface sends is checked here before it
//! reaches the session manager.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Maximum document path length in bytes.
pub const MAX_PATH_LEN: usize = 4096;
/// Maximum WebSocket message size.
pub const MAX_WS_MESSAGE_SIZE: usize = 1_048_576; // 1MB

/// Validation error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Document path is empty.
    #[error("file_path is empty")]
    PathEmpty,
    /// Document path exceeds maximum length.
    #[error("file_path too long (max {MAX_PATH_LEN} bytes)")]
    PathTooLong,
    /// Document path is relative.
    #[error("file_path must be absolute")]
    PathNotAbsolute,
    /// Document path does not name a file.
    #[error("file_path must name a file")]
    PathNotAFile,
    /// The directory that should contain the document is missing.
    #[error("parent directory does not exist")]
    ParentMissing,
    /// WebSocket message exceeds the configured size.
    #[error("message too large (max {max} bytes)")]
    MessageTooLarge {
        /// The configured limit.
        max: usize,
    },
    /// Bind host is not a loopback address.
    #[error("host must be a loopback address, got '{0}'")]
    NonLoopbackHost(String),
}

impl ValidationError {
    /// Metrics label for this failure.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageTooLarge { .. } => "message_size",
            Self::NonLoopbackHost(_) => "host",
            _ => "file_path",
        }
    }
}

/// Validate WebSocket message size against `max`.
///
/// # Errors
///
/// Returns [`ValidationError::MessageTooLarge`] if `size` exceeds `max`.
pub fn validate_message_size(size: usize, max: usize) -> Result<(), ValidationError> {
    if size > max {
        return Err(ValidationError::MessageTooLarge { max });
    }
    Ok(())
}

/// Check a document path and map it to its canonical form.
///
/// The path must be absolute and name a file whose parent directory exists.
/// The parent is canonicalized so that different spellings of the same file
/// (symlinked directories, `..` segments) map to one session. The file itself
/// need not exist yet.
///
/// # Errors
///
/// Returns the matching [`ValidationError`] when any of the above fails.
pub fn normalize_document_path(raw: &str) -> Result<PathBuf, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::PathEmpty);
    }
    if raw.len() > MAX_PATH_LEN {
        return Err(ValidationError::PathTooLong);
    }

    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(ValidationError::PathNotAbsolute);
    }
    if !matches!(path.components().next_back(), Some(Component::Normal(_))) {
        return Err(ValidationError::PathNotAFile);
    }
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(ValidationError::PathNotAFile);
    };

    let parent = parent
        .canonicalize()
        .map_err(|_| ValidationError::ParentMissing)?;
    if !parent.is_dir() {
        return Err(ValidationError::ParentMissing);
    }

    let normalized = parent.join(name);
    if normalized.is_dir() {
        return Err(ValidationError::PathNotAFile);
    }
    Ok(normalized)
}

/// Resolve a bind host, accepting loopback addresses only.
///
/// `localhost` maps to `127.0.0.1`.
///
/// # Errors
///
/// Returns [`ValidationError::NonLoopbackHost`] for anything that is not a
/// loopback IP literal or `localhost`.
pub fn loopback_host(host: &str) -> Result<IpAddr, ValidationError> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() => Ok(ip),
        _ => Err(ValidationError::NonLoopbackHost(host.to_string())),
    }
}
