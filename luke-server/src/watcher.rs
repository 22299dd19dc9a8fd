//! Change notifications for open documents.
//!
//! Editors and other tools may rewrite a document behind the bridge's back.
//! [`DocumentWatcher`] watches the directories that hold open documents and
//! forwards changes to those files. The resync task debounces them and asks
//! the session manager to reconcile.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::metrics;
use crate::session::SessionManager;

/// Watches the files of open documents.
pub struct DocumentWatcher {
    state: Mutex<WatchState>,
}

struct WatchState {
    watcher: RecommendedWatcher,
    /// Watched directories and how many tracked files live in each.
    dirs: HashMap<PathBuf, usize>,
    /// Tracked files, shared with the notify callback.
    files: Arc<RwLock<HashSet<PathBuf>>>,
}

impl std::fmt::Debug for DocumentWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWatcher")
            .field("files", &self.watched_files())
            .finish_non_exhaustive()
    }
}

impl DocumentWatcher {
    /// Create a watcher and the receiver its change notifications arrive on.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> notify::Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let files: Arc<RwLock<HashSet<PathBuf>>> = Arc::default();
        let tracked = Arc::clone(&files);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let tracked = tracked.read().unwrap_or_else(PoisonError::into_inner);
                for path in changed_paths(&event) {
                    if tracked.contains(path) {
                        let _ = tx.send(path.clone());
                    }
                }
            }
            Err(e) => tracing::warn!("File watcher error: {e}"),
        })?;

        let state = WatchState {
            watcher,
            dirs: HashMap::new(),
            files,
        };
        Ok((
            Self {
                state: Mutex::new(state),
            },
            rx,
        ))
    }

    /// Start reporting changes to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the containing directory cannot be watched.
    pub fn watch(&self, path: &Path) -> notify::Result<()> {
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let newly_tracked = state
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
        if !newly_tracked {
            return Ok(());
        }

        if let Some(count) = state.dirs.get_mut(dir) {
            *count += 1;
            return Ok(());
        }
        if let Err(e) = state.watcher.watch(dir, RecursiveMode::NonRecursive) {
            state
                .files
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(path);
            return Err(e);
        }
        state.dirs.insert(dir.to_path_buf(), 1);
        tracing::debug!("Watching for changes: {}", dir.display());
        Ok(())
    }

    /// Stop reporting changes to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory watch cannot be removed.
    pub fn unwatch(&self, path: &Path) -> notify::Result<()> {
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let was_tracked = state
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        if !was_tracked {
            return Ok(());
        }

        let remaining = match state.dirs.get_mut(dir) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return Ok(()),
        };
        if remaining == 0 {
            state.dirs.remove(dir);
            state.watcher.unwatch(dir)?;
            tracing::debug!("Stopped watching: {}", dir.display());
        }
        Ok(())
    }

    /// Files currently tracked, sorted.
    #[must_use]
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let files = state.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut files: Vec<_> = files.iter().cloned().collect();
        files.sort();
        files
    }
}

/// Paths touched by a content-affecting event.
fn changed_paths(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => &event.paths,
        _ => &[],
    }
}

/// Drain change notifications, debounce them, and reconcile each document.
///
/// Notifications arriving within `debounce` of each other are merged, so a
/// burst of events for one file causes a single re-read.
pub fn spawn_resync_task(
    manager: SessionManager,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let first = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                path = changes.recv() => match path {
                    Some(path) => path,
                    None => break,
                },
            };

            let mut pending = BTreeSet::from([first]);
            let quiet = tokio::time::sleep(debounce);
            tokio::pin!(quiet);
            loop {
                tokio::select! {
                    () = &mut quiet => break,
                    more = changes.recv() => match more {
                        Some(path) => {
                            pending.insert(path);
                        }
                        None => break,
                    },
                }
            }

            for path in pending {
                match manager.on_external_change(&path).await {
                    Ok(true) => {
                        metrics::record_external_change("reloaded");
                        tracing::info!(path = %path.display(), "Reloaded document after external change");
                    }
                    Ok(false) => {
                        metrics::record_external_change("ignored");
                        tracing::debug!(path = %path.display(), "External change needs no update");
                    }
                    Err(e) => {
                        metrics::record_external_change("failed");
                        tracing::warn!(path = %path.display(), "Failed to reconcile external change: {e}");
                    }
                }
            }
        }
        tracing::debug!("Document resync task stopped");
    })
}
