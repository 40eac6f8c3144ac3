//! Session registry for the relay server.
//!
//! Maintains the in-memory mapping from [`SessionId`] to [`SessionState`].
//! Sessions are created once and live until the process exits; there is no
//! removal path. Entries are lost on relay restart.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::RwLock;
use syncrelay_proto::session::{SessionId, SessionState};

/// Errors that can occur during session registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The referenced session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

/// In-memory store of session state.
///
/// Thread-safe via a single map-wide [`RwLock`]. The lock is never held
/// across an `.await`, so every operation completes in bounded time.
/// Every stored state carries its own `sessionId`.
///
/// The `*_then` and [`with_session`](Self::with_session) methods run a
/// callback while the lock is still held. The router uses them to queue
/// outbound frames in the same step as the read or write they reflect, so
/// the order frames are queued in matches the order writes land.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionState>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates a new, empty session registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a session seeded with `initial` and returns its new id.
    ///
    /// Uniqueness relies on the random id generator; no collision check is
    /// performed.
    pub fn create(&self, initial: SessionState) -> SessionId {
        let session_id = SessionId::generate();
        let state = initial.with_session_id(&session_id);
        self.sessions.write().insert(session_id.clone(), state);
        session_id
    }

    /// Returns a snapshot of the session's current state.
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<SessionState> {
        self.with_session(session_id, |current| current.cloned())
    }

    /// Runs `f` on the session's current state (`None` if it does not
    /// exist). No write to any session can land until `f` returns.
    pub fn with_session<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(Option<&SessionState>) -> R,
    ) -> R {
        let sessions = self.sessions.read();
        let out = f(sessions.get(session_id));
        drop(sessions);
        out
    }

    /// Overwrites the session's state, creating the session if absent.
    pub fn put(&self, session_id: &SessionId, state: SessionState) {
        self.put_then(session_id, state, |_| ());
    }

    /// Like [`put`](Self::put), then runs `f` on the stored state before any
    /// other read or write can observe the session.
    pub fn put_then<R>(
        &self,
        session_id: &SessionId,
        state: SessionState,
        f: impl FnOnce(&SessionState) -> R,
    ) -> R {
        let state = state.with_session_id(session_id);
        let mut sessions = self.sessions.write();
        let stored = match sessions.entry(session_id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(state);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(state),
        };
        let out = f(stored);
        drop(sessions);
        out
    }

    /// Overwrites the state of an existing session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SessionNotFound`] if the session does not
    /// exist; the registry is left unchanged.
    pub fn replace(
        &self,
        session_id: &SessionId,
        state: SessionState,
    ) -> Result<(), RegistryError> {
        self.replace_then(session_id, state, |_| ())
    }

    /// Like [`replace`](Self::replace), then runs `f` on the stored state
    /// before any other read or write can observe the session. `f` is not
    /// called when the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SessionNotFound`] if the session does not
    /// exist.
    pub fn replace_then<R>(
        &self,
        session_id: &SessionId,
        state: SessionState,
        f: impl FnOnce(&SessionState) -> R,
    ) -> Result<R, RegistryError> {
        let mut sessions = self.sessions.write();
        let slot = sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.clone()))?;
        *slot = state.with_session_id(session_id);
        let out = f(slot);
        drop(sessions);
        Ok(out)
    }

    /// Returns `true` if the session exists.
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
