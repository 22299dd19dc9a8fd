//! # Session Manager
//!
//! Tracks every open document, which one is active, and the rendering
//! surfaces attached to each.
//!
//! ## Lifecycle
//!
//! ```text
//! Unopened ──open──▶ Open ──activate──▶ Active
//!                     │ ▲                 │
//!                     │ └──other opened───┘
//!                     └──last surface closed──▶ Closed
//! ```
//!
//! A session is opened by a surface attaching or lazily by any command that
//! names its path. It closes when its last attached surface detaches; if it
//! was active, no session is active afterwards. A session with no surfaces
//! that is not active is released as soon as the command that opened it
//! settles, so controller reads of many paths do not accumulate sessions.
//!
//! ## Consistency
//!
//! All state lives behind one async mutex. A mutation holds it for the whole
//! read-modify-persist-broadcast cycle, so commands settle one at a time and
//! a read always observes every mutation accepted before it.
//!
//! Each session remembers the exact text it last wrote or loaded. A change
//! notification whose content matches that text is the echo of our own write
//! and is ignored, so a write never causes a reload cascade. A mutation
//! re-reads the document first and reloads if it no longer holds that text,
//! so an edit the watcher has not reported yet is never overwritten.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use luke_core::{codec, Element, ElementId, ElementStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::metrics;
use crate::storage::DocumentStorage;
use crate::validation::normalize_document_path;
use crate::watcher::DocumentWatcher;

/// Identifier of an attached rendering surface.
pub type SurfaceId = Uuid;

/// Message pushed to a rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SurfaceMessage {
    /// The full current element list of the surface's document.
    Update {
        /// Elements in document order.
        elements: Vec<Element>,
    },
    /// A message from the surface could not be applied.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Sending half of a rendering surface's push channel.
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    id: SurfaceId,
    sender: mpsc::UnboundedSender<SurfaceMessage>,
}

impl SurfaceHandle {
    /// Create a handle with a fresh id, plus the receiver its pushes arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SurfaceMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }

    /// The surface id.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    fn push(&self, message: SurfaceMessage) {
        if self.sender.send(message).is_err() {
            tracing::debug!(surface_id = %self.id, "Surface channel closed, dropping update");
        } else {
            metrics::record_surface_update();
        }
    }
}

/// A change to one document's elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert an element, or replace the one with the same id.
    Add(Element),
    /// Remove the element with this id.
    Delete(ElementId),
    /// Remove every element.
    Clear,
}

/// What a [`Mutation`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The element as stored.
    Added(Element),
    /// Whether the element existed before the delete.
    Deleted {
        /// Requested id.
        id: ElementId,
        /// `false` if nothing had that id.
        existed: bool,
    },
    /// How many elements were removed.
    Cleared {
        /// Number of elements removed.
        removed: usize,
    },
}

/// Result of attaching a surface to a document.
#[derive(Debug, Clone)]
pub struct SurfaceAttachment {
    /// Normalized document path the surface is attached to.
    pub path: PathBuf,
    /// Elements to send the surface as its initial update.
    pub elements: Vec<Element>,
}

#[derive(Debug)]
struct Session {
    store: ElementStore,
    surfaces: Vec<SurfaceHandle>,
    /// Text most recently written or loaded for this document.
    last_synced: Option<String>,
}

impl Session {
    /// Replace the store with the document in `text`.
    ///
    /// Returns `true` if the elements changed.
    fn reload(&mut self, text: Option<String>) -> bool {
        let document = text.as_deref().map(codec::decode).unwrap_or_default();
        let reloaded = ElementStore::from_elements(document.elements);
        self.last_synced = text;
        if reloaded == self.store {
            return false;
        }
        self.store = reloaded;
        true
    }

    fn broadcast(&self) {
        let update = SurfaceMessage::Update {
            elements: self.store.get_all(),
        };
        for surface in &self.surfaces {
            surface.push(update.clone());
        }
    }
}

#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: HashMap<PathBuf, Session>,
    active: Option<PathBuf>,
}

impl SessionRegistry {
    /// Resolve an explicit path, or fall back to the active document.
    fn resolve(&self, file_path: Option<&str>) -> SessionResult<PathBuf> {
        match file_path {
            Some(raw) => normalize(raw),
            None => self.active.clone().ok_or(SessionError::NoActiveDocument),
        }
    }
}

fn normalize(raw: &str) -> SessionResult<PathBuf> {
    normalize_document_path(raw).map_err(|e| {
        metrics::record_validation_failure(e.kind());
        SessionError::InvalidPath {
            path: raw.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Shared handle to all document sessions.
///
/// Cloning is cheap; every clone sees the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    registry: Arc<Mutex<SessionRegistry>>,
    storage: Arc<dyn DocumentStorage>,
    watcher: Option<Arc<DocumentWatcher>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager persisting through `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self {
            registry: Arc::default(),
            storage,
            watcher: None,
        }
    }

    /// Track open documents with `watcher`.
    #[must_use]
    pub fn with_watcher(mut self, watcher: Arc<DocumentWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Load the session for `path` if it is not open yet.
    async fn session_mut<'a>(
        &self,
        registry: &'a mut SessionRegistry,
        path: &Path,
    ) -> SessionResult<&'a mut Session> {
        match registry.sessions.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let text = self.read(path).await?;
                let document = text.as_deref().map(codec::decode).unwrap_or_default();
                if let Some(watcher) = &self.watcher {
                    if let Err(e) = watcher.watch(path) {
                        tracing::warn!(path = %path.display(), "Failed to watch document: {e}");
                    }
                }
                tracing::info!(
                    path = %path.display(),
                    elements = document.elements.len(),
                    "Opened document session"
                );
                Ok(entry.insert(Session {
                    store: ElementStore::from_elements(document.elements),
                    surfaces: Vec::new(),
                    last_synced: text,
                }))
            }
        }
    }

    async fn read(&self, path: &Path) -> SessionResult<Option<String>> {
        self.storage
            .read(path)
            .await
            .map_err(|source| SessionError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Drop the session for `path` if no surface shows it and it is not active.
    fn release_if_idle(&self, registry: &mut SessionRegistry, path: &Path) {
        let idle = registry
            .sessions
            .get(path)
            .is_some_and(|s| s.surfaces.is_empty());
        if !idle || registry.active.as_deref() == Some(path) {
            return;
        }

        registry.sessions.remove(path);
        if let Some(watcher) = &self.watcher {
            if let Err(e) = watcher.unwatch(path) {
                tracing::warn!(path = %path.display(), "Failed to unwatch document: {e}");
            }
        }
        tracing::debug!(path = %path.display(), "Released idle document session");
    }

    /// Make `path` active, releasing the previously active session if idle.
    fn activate(&self, registry: &mut SessionRegistry, path: &Path) {
        let previous = registry.active.replace(path.to_path_buf());
        if previous.as_deref() == Some(path) {
            return;
        }
        tracing::info!(path = %path.display(), "Active document changed");
        if let Some(previous) = previous {
            self.release_if_idle(registry, &previous);
        }
    }

    /// Attach a rendering surface to the document at `file_path`.
    ///
    /// Opens the document if needed and makes it active. The returned
    /// snapshot is what the surface should display first; other surfaces are
    /// not notified.
    ///
    /// # Errors
    ///
    /// Fails if the path is invalid or the document cannot be read.
    pub async fn open_session(
        &self,
        file_path: &str,
        surface: SurfaceHandle,
    ) -> SessionResult<SurfaceAttachment> {
        let path = normalize(file_path)?;
        let mut registry = self.registry.lock().await;
        let session = self.session_mut(&mut registry, &path).await?;
        tracing::debug!(surface_id = %surface.id(), path = %path.display(), "Surface attached");
        session.surfaces.push(surface);
        let elements = session.store.get_all();
        self.activate(&mut registry, &path);
        Ok(SurfaceAttachment { path, elements })
    }

    /// Detach a surface. Returns `true` if this closed the session.
    pub async fn close_surface(&self, path: &Path, surface_id: SurfaceId) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.sessions.get_mut(path) else {
            return false;
        };
        session.surfaces.retain(|s| s.id() != surface_id);
        if !session.surfaces.is_empty() {
            return false;
        }

        registry.sessions.remove(path);
        if registry.active.as_deref() == Some(path) {
            registry.active = None;
        }
        if let Some(watcher) = &self.watcher {
            if let Err(e) = watcher.unwatch(path) {
                tracing::warn!(path = %path.display(), "Failed to unwatch document: {e}");
            }
        }
        tracing::info!(path = %path.display(), "Closed document session");
        true
    }

    /// Open the document at `file_path` if needed and make it active.
    ///
    /// # Errors
    ///
    /// Fails if the path is invalid or the document cannot be read.
    pub async fn set_active_path(&self, file_path: &str) -> SessionResult<PathBuf> {
        let path = normalize(file_path)?;
        let mut registry = self.registry.lock().await;
        self.session_mut(&mut registry, &path).await?;
        self.activate(&mut registry, &path);
        Ok(path)
    }

    /// The active document, if any.
    pub async fn active_path(&self) -> Option<PathBuf> {
        self.registry.lock().await.active.clone()
    }

    /// Apply a mutation to a document and persist it.
    ///
    /// `file_path` of `None` targets the active document. The change is made
    /// on a copy of the store; only once the new content is written is the
    /// copy committed and one update pushed to every attached surface. A
    /// delete or clear that changes nothing is not written.
    ///
    /// The document is re-read first. If storage no longer holds what was
    /// last loaded or written, the session reloads and the mutation applies
    /// to the stored content. An idle session opened for the mutation is
    /// released afterwards.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the element is invalid, there is
    /// no target document, or reading or writing the document fails.
    pub async fn apply_mutation(
        &self,
        file_path: Option<&str>,
        mutation: Mutation,
    ) -> SessionResult<MutationOutcome> {
        if let Mutation::Add(element) = &mutation {
            if let Err(e) = element.validate() {
                metrics::record_validation_failure("element");
                return Err(e.into());
            }
        }

        let mut registry = self.registry.lock().await;
        let path = registry.resolve(file_path)?;
        let result = self.mutate(&mut registry, &path, mutation).await;
        self.release_if_idle(&mut registry, &path);
        result
    }

    async fn mutate(
        &self,
        registry: &mut SessionRegistry,
        path: &Path,
        mutation: Mutation,
    ) -> SessionResult<MutationOutcome> {
        let was_open = registry.sessions.contains_key(path);
        let session = self.session_mut(registry, path).await?;
        let mut refreshed = false;
        if was_open {
            let text = self.read(path).await?;
            if text != session.last_synced {
                tracing::debug!(path = %path.display(), "Document changed in storage, reloading");
                refreshed = session.reload(text);
            }
        }

        let mut next = session.store.clone();
        let outcome = match mutation {
            Mutation::Add(element) => MutationOutcome::Added(next.put(element).clone()),
            Mutation::Delete(id) => {
                let existed = next.delete(id.as_str());
                MutationOutcome::Deleted { id, existed }
            }
            Mutation::Clear => {
                let removed = next.len();
                next.clear();
                MutationOutcome::Cleared { removed }
            }
        };
        if next == session.store && !matches!(outcome, MutationOutcome::Added(_)) {
            if refreshed {
                session.broadcast();
            }
            return Ok(outcome);
        }

        let text = codec::encode(&next.to_document())?;
        if let Err(source) = self.storage.write(path, &text).await {
            if refreshed {
                session.broadcast();
            }
            return Err(SessionError::Write {
                path: path.to_path_buf(),
                source,
            });
        }

        session.store = next;
        session.last_synced = Some(text);
        session.broadcast();
        tracing::debug!(
            path = %path.display(),
            elements = session.store.len(),
            surfaces = session.surfaces.len(),
            "Document updated"
        );
        Ok(outcome)
    }

    /// Reconcile an open document with what is now in storage.
    ///
    /// Returns `true` if the store was reloaded and surfaces were updated.
    /// Paths with no open session, echoes of our own writes and content that
    /// decodes to the current elements are ignored.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be read.
    pub async fn on_external_change(&self, path: &Path) -> SessionResult<bool> {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.sessions.get_mut(path) else {
            return Ok(false);
        };

        let text = self.read(path).await?;
        if session.last_synced == text {
            tracing::trace!(path = %path.display(), "Ignoring echo of own write");
            return Ok(false);
        }
        if !session.reload(text) {
            return Ok(false);
        }

        session.broadcast();
        Ok(true)
    }

    /// Elements of a document. Reads it without activating if not open.
    ///
    /// # Errors
    ///
    /// Fails if there is no target document or it cannot be read.
    pub async fn elements(&self, file_path: Option<&str>) -> SessionResult<Vec<Element>> {
        let mut registry = self.registry.lock().await;
        let path = registry.resolve(file_path)?;
        let elements = self.session_mut(&mut registry, &path).await?.store.get_all();
        self.release_if_idle(&mut registry, &path);
        Ok(elements)
    }

    /// One element of a document, if it exists.
    ///
    /// # Errors
    ///
    /// Fails if there is no target document or it cannot be read.
    pub async fn element_by_id(
        &self,
        file_path: Option<&str>,
        id: &str,
    ) -> SessionResult<Option<Element>> {
        let mut registry = self.registry.lock().await;
        let path = registry.resolve(file_path)?;
        let element = self
            .session_mut(&mut registry, &path)
            .await?
            .store
            .get_by_id(id)
            .cloned();
        self.release_if_idle(&mut registry, &path);
        Ok(element)
    }

    /// Paths of all open sessions, sorted.
    pub async fn open_paths(&self) -> Vec<PathBuf> {
        let registry = self.registry.lock().await;
        let mut paths: Vec<_> = registry.sessions.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of surfaces attached to `path`.
    pub async fn surface_count(&self, path: &Path) -> usize {
        self.registry
            .lock()
            .await
            .sessions
            .get(path)
            .map_or(0, |s| s.surfaces.len())
    }
}
