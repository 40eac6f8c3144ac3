//! Wire message types for the `SyncRelay` protocol.
//!
//! Every message is a JSON object with a `type` discriminator. Apart from
//! `type` and `sessionId`, fields belong to the application and are carried
//! through untouched.

use crate::session::{SessionId, SessionState};

/// Maximum allowed size of an inbound message in bytes (64 KB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Name of the discriminator field.
pub const TYPE_KEY: &str = "type";

/// `type` value of a client request to create a session.
pub const CREATE_SESSION: &str = "create-session";
/// `type` value of the server reply carrying a new session id.
pub const CREATED_SESSION: &str = "created-session";
/// `type` value of a client request to join a session.
pub const JOIN: &str = "join";
/// `type` value of a state replacement, in both directions.
pub const ACTION: &str = "action";

/// Messages sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Create a new session seeded with `payload`.
    CreateSession {
        /// Initial application state (every field except `type`).
        payload: SessionState,
    },

    /// Subscribe to an existing session and receive its current state.
    Join {
        /// Session to join.
        session_id: SessionId,
    },

    /// Replace the session's state and broadcast it to its members.
    Action {
        /// Target session.
        session_id: SessionId,
        /// The complete record minus `type`, including `sessionId`.
        state: SessionState,
    },
}

impl ClientMessage {
    /// Returns the wire `type` of this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => CREATE_SESSION,
            Self::Join { .. } => JOIN,
            Self::Action { .. } => ACTION,
        }
    }
}

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Reply to `create-session`, sent only to the creator.
    CreatedSession {
        /// Identifier of the newly created session.
        session_id: SessionId,
    },

    /// The full current state of a session.
    ///
    /// Sent as the reply to `join` and broadcast to the group on `action`.
    Action {
        /// State record, including `sessionId`.
        state: SessionState,
    },
}

impl ServerMessage {
    /// Returns the wire `type` of this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreatedSession { .. } => CREATED_SESSION,
            Self::Action { .. } => ACTION,
        }
    }
}
