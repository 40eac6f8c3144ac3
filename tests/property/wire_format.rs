//! Property-based tests for the JSON wire format.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never panics either decoder (returns `Err` gracefully).
//! 2. A `create-session` payload reaches the relay with every field except
//!    `type` intact.
//! 3. An `action` body becomes the session state minus `type`, `sessionId`
//!    included.
//! 4. Encoded relay messages always carry the relay's `type`, whatever keys
//!    the application state contains.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use syncrelay_proto::codec::{self, CodecError};
use syncrelay_proto::message::{ClientMessage, ServerMessage};
use syncrelay_proto::session::{SessionId, SessionState};

// --- Strategies ---

/// Strategy for scalar JSON leaves.
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for nested JSON values (arrays and objects of leaves).
fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for application fields: never `type` or `sessionId`.
fn arb_fields() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z][a-zA-Z0-9_]{0,10}", arb_value(), 0..6).prop_map(|m| {
        m.into_iter()
            .filter(|(k, _)| k != "type" && k != "sessionId")
            .collect()
    })
}

// --- Property tests ---

proptest! {
    /// Arbitrary text never causes a panic in either decoder.
    #[test]
    fn random_text_decode_no_panic(text in ".{0,256}") {
        let _ = codec::decode_client(&text);
        let _ = codec::decode_server(&text);
    }

    /// Any JSON object whose `type` is unknown is rejected by name.
    #[test]
    fn unknown_type_is_reported(kind in "[a-z]{1,12}", fields in arb_fields()) {
        prop_assume!(!["create-session", "join", "action"].contains(&kind.as_str()));
        let mut body = fields;
        body.insert("type".to_string(), Value::String(kind.clone()));
        let text = serde_json::to_string(&body).unwrap();
        match codec::decode_client(&text) {
            Err(CodecError::UnknownType(name)) => prop_assert_eq!(name, kind),
            other => prop_assert!(false, "expected UnknownType, got {:?}", other),
        }
    }

    /// A create-session payload keeps every application field.
    #[test]
    fn create_session_payload_preserved(fields in arb_fields()) {
        let mut body = fields.clone();
        body.insert("type".to_string(), json!("create-session"));
        let text = serde_json::to_string(&body).unwrap();

        let msg = codec::decode_client(&text).unwrap();
        prop_assert_eq!(msg, ClientMessage::CreateSession {
            payload: SessionState::from_map(fields),
        });
    }

    /// An action body becomes the new state verbatim, minus `type`.
    #[test]
    fn action_body_is_full_state(id in "[a-f0-9-]{1,36}", fields in arb_fields()) {
        let mut body = fields.clone();
        body.insert("sessionId".to_string(), Value::String(id.clone()));
        body.insert("type".to_string(), json!("action"));
        let text = serde_json::to_string(&body).unwrap();

        match codec::decode_client(&text).unwrap() {
            ClientMessage::Action { session_id, state } => {
                prop_assert_eq!(session_id.as_str(), id.as_str());
                let expected = SessionState::from_map(fields).with_session_id(&session_id);
                prop_assert_eq!(state, expected);
            }
            other => prop_assert!(false, "expected Action, got {:?}", other),
        }
    }

    /// Relay output always carries its own `type`, even if state has one.
    #[test]
    fn encoded_action_type_is_authoritative(fields in arb_fields(), stray in arb_leaf()) {
        let mut state = SessionState::from_map(fields);
        state.insert("type", stray);
        let text = codec::encode_server(&ServerMessage::Action { state }).unwrap();
        let parsed: Map<String, Value> = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed.get("type"), Some(&json!("action")));
    }

    /// A created-session reply parses back to the same id.
    #[test]
    fn created_session_reply_carries_id(_seed in any::<u8>()) {
        let session_id = SessionId::generate();
        let text = codec::encode_server(&ServerMessage::CreatedSession {
            session_id: session_id.clone(),
        }).unwrap();
        prop_assert_eq!(
            codec::decode_server(&text).unwrap(),
            ServerMessage::CreatedSession { session_id }
        );
    }
}
