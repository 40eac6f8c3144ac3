//! JSON encoding and decoding for the `SyncRelay` wire protocol.
//!
//! Decoding goes through a generic JSON object first so that a bad body, a
//! missing or unknown `type`, and a missing `sessionId` are reported as
//! distinct errors. Encoding writes `type` last, so it always wins over an
//! application field of the same name.

use serde_json::{Map, Value};

use crate::message::{
    ACTION, CREATE_SESSION, CREATED_SESSION, ClientMessage, JOIN, ServerMessage, TYPE_KEY,
};
use crate::session::{SESSION_ID_KEY, SessionId, SessionState};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The body is not a JSON object.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// The object has no string `type` field.
    #[error("message has no string `type` field")]
    MissingType,
    /// The `type` field names no known message.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// A message that targets a session has no string `sessionId`.
    #[error("message has no string `sessionId` field")]
    MissingSessionId,
    /// Serialization of an outbound message failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Decodes a client-to-relay message from JSON text.
///
/// # Errors
///
/// Returns a [`CodecError`] describing why the body was rejected.
pub fn decode_client(text: &str) -> Result<ClientMessage, CodecError> {
    let (kind, mut fields) = split_type(text)?;
    match kind.as_str() {
        CREATE_SESSION => Ok(ClientMessage::CreateSession {
            payload: SessionState::from_map(fields),
        }),
        JOIN => Ok(ClientMessage::Join {
            session_id: take_session_id(&mut fields)?,
        }),
        ACTION => {
            let session_id = session_id_of(&fields)?;
            Ok(ClientMessage::Action {
                session_id,
                state: SessionState::from_map(fields),
            })
        }
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

/// Encodes a client-to-relay message as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode_client(msg: &ClientMessage) -> Result<String, CodecError> {
    let fields = match msg {
        ClientMessage::CreateSession { payload } => payload.as_map().clone(),
        ClientMessage::Join { session_id } => SessionState::new()
            .with_session_id(session_id)
            .into_map(),
        ClientMessage::Action { session_id, state } => {
            state.clone().with_session_id(session_id).into_map()
        }
    };
    to_text(fields, msg.kind())
}

/// Decodes a relay-to-client message from JSON text.
///
/// # Errors
///
/// Returns a [`CodecError`] describing why the body was rejected.
pub fn decode_server(text: &str) -> Result<ServerMessage, CodecError> {
    let (kind, mut fields) = split_type(text)?;
    match kind.as_str() {
        CREATED_SESSION => Ok(ServerMessage::CreatedSession {
            session_id: take_session_id(&mut fields)?,
        }),
        ACTION => Ok(ServerMessage::Action {
            state: SessionState::from_map(fields),
        }),
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

/// Encodes a relay-to-client message as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode_server(msg: &ServerMessage) -> Result<String, CodecError> {
    let fields = match msg {
        ServerMessage::CreatedSession { session_id } => SessionState::new()
            .with_session_id(session_id)
            .into_map(),
        ServerMessage::Action { state } => state.as_map().clone(),
    };
    to_text(fields, msg.kind())
}

/// Parses `text` as a JSON object and removes its `type` field.
fn split_type(text: &str) -> Result<(String, Map<String, Value>), CodecError> {
    let mut fields: Map<String, Value> =
        serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?;
    match fields.shift_remove(TYPE_KEY) {
        Some(Value::String(kind)) => Ok((kind, fields)),
        _ => Err(CodecError::MissingType),
    }
}

fn session_id_of(fields: &Map<String, Value>) -> Result<SessionId, CodecError> {
    fields
        .get(SESSION_ID_KEY)
        .and_then(Value::as_str)
        .map(SessionId::new)
        .ok_or(CodecError::MissingSessionId)
}

fn take_session_id(fields: &mut Map<String, Value>) -> Result<SessionId, CodecError> {
    let id = session_id_of(fields)?;
    fields.shift_remove(SESSION_ID_KEY);
    Ok(id)
}

fn to_text(mut fields: Map<String, Value>, kind: &str) -> Result<String, CodecError> {
    // Remove first so the re-inserted key lands at the end in preserve_order maps.
    fields.shift_remove(TYPE_KEY);
    fields.insert(TYPE_KEY.to_string(), Value::String(kind.to_string()));
    serde_json::to_string(&fields).map_err(|e| CodecError::Serialization(e.to_string()))
}
