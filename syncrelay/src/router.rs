//! Message router: dispatches inbound client messages to their handlers.
//!
//! Each decoded [`ClientMessage`] goes to exactly one handler, which reads
//! or writes the [`SessionRegistry`](crate::registry::SessionRegistry) and
//! replies through the [`Hub`](crate::hub::Hub). The router never looks
//! inside session state. Failures are returned to the caller for logging;
//! nothing is ever sent back to the client on error.
//!
//! Join replies and action broadcasts are queued while the registry lock is
//! held. Every member therefore receives a session's updates in the order
//! they were stored, and the last frame a member receives is the stored
//! state.

use syncrelay_proto::codec::{self, CodecError};
use syncrelay_proto::message::{ClientMessage, ServerMessage};
use syncrelay_proto::session::{SessionId, SessionState};

use crate::hub::ConnectionId;
use crate::registry::RegistryError;
use crate::server::RelayState;

/// What the relay does with a `join` or `action` naming an unknown session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnknownSessionPolicy {
    /// Log and drop the message.
    #[default]
    Ignore,
    /// An `action` creates the session with its state; a `join` subscribes
    /// the sender so it receives the first action.
    Create,
}

impl std::fmt::Display for UnknownSessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Create => write!(f, "create"),
        }
    }
}

/// Routing options fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Handling of `join`/`action` for sessions that do not exist.
    pub unknown_session: UnknownSessionPolicy,
}

/// Reasons an inbound message was dropped.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The body could not be decoded into a known message.
    #[error(transparent)]
    Decode(#[from] CodecError),
    /// The message referenced a session that does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

impl From<RegistryError> for RouteError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::SessionNotFound(id) => Self::SessionNotFound(id),
        }
    }
}

/// Decodes a text body and dispatches it.
///
/// # Errors
///
/// Returns [`RouteError`] if the message was dropped. The connection stays
/// usable either way.
pub fn handle_text(
    state: &RelayState,
    conn_id: ConnectionId,
    text: &str,
) -> Result<(), RouteError> {
    let msg = codec::decode_client(text)?;
    dispatch(state, conn_id, msg)
}

/// Dispatches a decoded message to its handler.
///
/// # Errors
///
/// Returns [`RouteError::SessionNotFound`] when the target session is
/// unknown and the policy drops such messages.
pub fn dispatch(
    state: &RelayState,
    conn_id: ConnectionId,
    msg: ClientMessage,
) -> Result<(), RouteError> {
    match msg {
        ClientMessage::CreateSession { payload } => {
            on_create_session(state, conn_id, payload);
            Ok(())
        }
        ClientMessage::Join { session_id } => on_join(state, conn_id, session_id),
        ClientMessage::Action {
            session_id,
            state: new_state,
        } => on_action(state, conn_id, session_id, new_state),
    }
}

fn on_create_session(state: &RelayState, conn_id: ConnectionId, payload: SessionState) {
    // Nobody else knows the id yet, so no lock is needed around the reply.
    let session_id = state.registry.create(payload);
    state.hub.join_group(conn_id, &session_id);

    tracing::info!(
        conn_id = %conn_id,
        session_id = %session_id,
        sessions = state.registry.len(),
        "created session"
    );

    let reply = ServerMessage::CreatedSession { session_id };
    state.hub.send(conn_id, &reply);
}

fn on_join(
    state: &RelayState,
    conn_id: ConnectionId,
    session_id: SessionId,
) -> Result<(), RouteError> {
    let policy = state.router.unknown_session;
    state.registry.with_session(&session_id, |current| match current {
        Some(current) => {
            state.hub.join_group(conn_id, &session_id);
            tracing::debug!(conn_id = %conn_id, session_id = %session_id, "joined session");

            let reply = ServerMessage::Action {
                state: current.clone(),
            };
            state.hub.send(conn_id, &reply);
            Ok(())
        }
        None if policy == UnknownSessionPolicy::Create => {
            state.hub.join_group(conn_id, &session_id);
            tracing::debug!(
                conn_id = %conn_id,
                session_id = %session_id,
                "joined session that has no state yet"
            );
            Ok(())
        }
        None => Err(RouteError::SessionNotFound(session_id.clone())),
    })
}

fn on_action(
    state: &RelayState,
    conn_id: ConnectionId,
    session_id: SessionId,
    new_state: SessionState,
) -> Result<(), RouteError> {
    let fan_out = |stored: &SessionState| {
        let update = ServerMessage::Action {
            state: stored.clone(),
        };
        state.hub.broadcast_to_group(&session_id, &update)
    };
    let delivered = match state.router.unknown_session {
        UnknownSessionPolicy::Ignore => {
            state.registry.replace_then(&session_id, new_state, fan_out)?
        }
        UnknownSessionPolicy::Create => state.registry.put_then(&session_id, new_state, fan_out),
    };

    tracing::debug!(
        conn_id = %conn_id,
        session_id = %session_id,
        delivered,
        "applied action"
    );
    Ok(())
}
