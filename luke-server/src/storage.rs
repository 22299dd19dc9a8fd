//! Persistence backend for documents.
//!
//! The session manager only needs "read the whole file" and "replace the whole
//! file". [`FsStorage`] is the real backend; tests substitute their own.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Whole-file document persistence.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read the document text. `Ok(None)` when nothing exists at `path`.
    async fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace the document text.
    async fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Local filesystem storage.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so readers never observe a half-written document.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    /// Create a filesystem storage backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

#[async_trait]
impl DocumentStorage for FsStorage {
    async fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let tmp = temp_path(path);
        if let Err(e) = tokio::fs::write(&tmp, contents).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}
