//! Session identity and state types.
//!
//! A session is identified by an opaque [`SessionId`] and owns a schema-less
//! [`SessionState`] document. The relay never interprets state contents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key under which the owning session's id is stored inside a state record.
pub const SESSION_ID_KEY: &str = "sessionId";

/// Opaque identifier for a session.
///
/// Generated server-side from a random UUID (v4). Clients echo it back as an
/// arbitrary string, so any string is accepted when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh, collision-resistant session identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application-defined state of a session.
///
/// An insertion-ordered map of string keys to arbitrary JSON values. State is
/// always replaced wholesale; there is no merge operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(Map<String, Value>);

impl SessionState {
    /// Creates an empty state document.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts a value, returning the previous value for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Number of top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the `sessionId` recorded in this state, if it is a string.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.0
            .get(SESSION_ID_KEY)
            .and_then(Value::as_str)
            .map(SessionId::new)
    }

    /// Returns this state with `sessionId` set to `id`, overriding any
    /// existing value.
    #[must_use]
    pub fn with_session_id(mut self, id: &SessionId) -> Self {
        self.0
            .insert(SESSION_ID_KEY.to_string(), Value::String(id.0.clone()));
        self
    }

    /// Borrows the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the state, returning the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SessionState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
