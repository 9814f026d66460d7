//! Session persistence: types and storage implementations.
//!
//! A [`Session`] wraps one [`AgentState`] with identity and timestamps. The
//! [`SessionStore`] contract is small: sessions round-trip through
//! serialisation without altering semantics, and listing is cheap even when
//! the states themselves are large (a long conversation plus its virtual
//! files can be megabytes). Both stores therefore answer [`SessionStore::list`]
//! from summaries, never by deserialising whole states, and summaries carry
//! the workflow position so a host can show "3 sessions, two in planning"
//! without touching a single message.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratum_types::{Phase, StateError};

use crate::state::AgentState;

/// A persisted agent session: its state plus bookkeeping metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    pub id: String,
    /// The agent state at save time.
    pub state: AgentState,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved. Stamped by the store on every save.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session around an empty state.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_state(id, AgentState::new())
    }

    /// Create a session around an existing state.
    #[must_use]
    pub fn with_state(id: impl Into<String>, state: AgentState) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a summary of this session (without the state).
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.state.messages.len(),
            current_phase: self.state.phase.current_phase,
            compressions: self.state.compression_history.len(),
        }
    }
}

/// A lightweight listing entry for a session.
///
/// Carries the workflow bookkeeping a host dashboard needs, so listing never
/// has to load message bodies or virtual files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unique session identifier.
    pub id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
    /// Number of messages at save time.
    pub message_count: usize,
    /// Workflow position at save time.
    pub current_phase: Phase,
    /// Compressions applied so far (bounded by the history cap).
    pub compressions: usize,
}

/// Trait for persisting and loading sessions.
///
/// # Example
///
/// ```ignore
/// let store = InMemorySessionStore::new();
/// store.save(&Session::new("s-1")).await?;
/// let loaded = store.load("s-1").await?;
/// assert_eq!(loaded.id, "s-1");
/// ```
pub trait SessionStore: Send + Sync {
    /// Save a session (create or update), stamping `updated_at`.
    fn save(&self, session: &Session) -> impl Future<Output = Result<(), StateError>> + Send;

    /// Load a session by id.
    fn load(&self, id: &str) -> impl Future<Output = Result<Session, StateError>> + Send;

    /// List all session summaries, ordered by session id.
    fn list(&self) -> impl Future<Output = Result<Vec<SessionSummary>, StateError>> + Send;

    /// Delete a session by id.
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), StateError>> + Send;
}

/// In-memory session storage.
///
/// Sessions live in a `BTreeMap` behind a plain `std::sync::RwLock`: every
/// operation is a short clone-in/clone-out critical section with no await
/// point inside, so an async lock would buy nothing. Ordering falls out of
/// the map, making [`SessionStore::list`] deterministic. Share the store
/// across tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guarded<T>(&self, op: impl FnOnce(&mut BTreeMap<String, Session>) -> T) -> T {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        op(&mut sessions)
    }
}

impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), StateError> {
        let mut stamped = session.clone();
        stamped.updated_at = Utc::now();
        self.guarded(|sessions| {
            sessions.insert(stamped.id.clone(), stamped);
        });
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Session, StateError> {
        self.guarded(|sessions| sessions.get(id).cloned())
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StateError> {
        Ok(self.guarded(|sessions| sessions.values().map(Session::summary).collect()))
    }

    async fn delete(&self, id: &str) -> Result<(), StateError> {
        match self.guarded(|sessions| sessions.remove(id)) {
            Some(_) => Ok(()),
            None => Err(StateError::NotFound(id.to_string())),
        }
    }
}

/// Name of the summary index maintained next to the session files.
const INDEX_FILE: &str = "index.json";

/// Directory-backed session storage with a maintained summary index.
///
/// Layout under the root directory:
///
/// ```text
/// <root>/index.json      summaries, keyed by session id
/// <root>/<id>.json       one full session per file, compact JSON
/// ```
///
/// [`SessionStore::list`] reads only the index, so listing cost does not
/// grow with conversation size. Every write goes through a temp file and a
/// rename, so a crash mid-save leaves the previous session and index intact
/// rather than a truncated file. The index is rewritten on every save and
/// delete; one process owns a session directory at a time.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `root`. The directory is created on the
    /// first `save()`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn read_index(&self) -> Result<BTreeMap<String, SessionSummary>, StateError> {
        match tokio::fs::read(self.root.join(INDEX_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StateError::Serialization(format!("index: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(
        &self,
        index: &BTreeMap<String, SessionSummary>,
    ) -> Result<(), StateError> {
        let bytes = serde_json::to_vec(index)
            .map_err(|e| StateError::Serialization(format!("index: {e}")))?;
        write_atomic(&self.root.join(INDEX_FILE), &bytes).await
    }
}

/// Write through a sibling temp file and rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StateError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

impl SessionStore for FileSessionStore {
    async fn save(&self, session: &Session) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut stamped = session.clone();
        stamped.updated_at = Utc::now();
        let bytes = serde_json::to_vec(&stamped)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        write_atomic(&self.session_path(&stamped.id), &bytes).await?;

        let mut index = self.read_index().await?;
        index.insert(stamped.id.clone(), stamped.summary());
        self.write_index(&index).await?;

        tracing::debug!(id = %stamped.id, bytes = bytes.len(), "session saved");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Session, StateError> {
        let bytes = match tokio::fs::read(self.session_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StateError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StateError::Serialization(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StateError> {
        Ok(self.read_index().await?.into_values().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StateError> {
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StateError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let mut index = self.read_index().await?;
        if index.remove(id).is_some() {
            self.write_index(&index).await?;
        }
        Ok(())
    }
}
