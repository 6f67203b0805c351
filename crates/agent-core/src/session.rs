//! Session Management
//!
//! A session is one chat: its conversation history and the model it talks
//! to. Sessions live in memory only and are gone after a restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Conversation;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    pub conversation: Conversation,

    /// Model used for this session
    pub model: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Bumped on every `touch`
    #[serde(default)]
    pub revision: u64,
}

impl Session {
    pub fn new(id: SessionId, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation: Conversation::with_system_prompt(system_prompt),
            model: model.into(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Update the activity timestamp and revision
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.revision += 1;
    }

    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

/// Where a session stood when it was read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionVersion {
    /// Store generation, bumped by `clear`
    pub generation: u64,

    /// Revision of the stored session; `None` if it did not exist
    pub revision: Option<u64>,
}

/// Result of a checked save
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The store was cleared after the session was read; nothing was written
    Cleared,
    /// Someone else saved or deleted the session after it was read
    Conflict,
}

/// Session store trait
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> crate::Result<()>;

    fn load(&self, id: &SessionId) -> crate::Result<Option<Session>>;

    /// Load a session together with the version a later
    /// [`SessionStore::save_if_current`] is checked against
    fn load_versioned(&self, id: &SessionId) -> crate::Result<(Option<Session>, SessionVersion)>;

    /// Save only if neither the store nor this session changed since `read`
    fn save_if_current(&self, session: &Session, read: SessionVersion) -> crate::Result<SaveOutcome>;

    /// Remove a session, returning whether it existed
    fn delete(&self, id: &SessionId) -> crate::Result<bool>;

    /// Remove every session and start a new generation
    fn clear(&self) -> crate::Result<usize>;
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<SessionId, Session>,
    generation: u64,
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Sessions>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> crate::Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.by_id.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> crate::Result<Option<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.by_id.get(id).cloned())
    }

    fn load_versioned(&self, id: &SessionId) -> crate::Result<(Option<Session>, SessionVersion)> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.by_id.get(id).cloned();
        let version = SessionVersion {
            generation: sessions.generation,
            revision: session.as_ref().map(|s| s.revision),
        };
        Ok((session, version))
    }

    fn save_if_current(&self, session: &Session, read: SessionVersion) -> crate::Result<SaveOutcome> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.generation != read.generation {
            return Ok(SaveOutcome::Cleared);
        }
        if sessions.by_id.get(&session.id).map(|s| s.revision) != read.revision {
            return Ok(SaveOutcome::Conflict);
        }
        sessions.by_id.insert(session.id.clone(), session.clone());
        Ok(SaveOutcome::Saved)
    }

    fn delete(&self, id: &SessionId) -> crate::Result<bool> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.by_id.remove(id).is_some())
    }

    fn clear(&self) -> crate::Result<usize> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.by_id.len();
        sessions.by_id.clear();
        sessions.generation = sessions.generation.wrapping_add(1);
        Ok(removed)
    }
}
