// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Integration tests for session create / join / action over WebSockets.
//!
//! Each test starts an in-process relay on an OS-assigned port and drives it
//! with `tokio-tungstenite` clients, checking exactly what every client
//! receives.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use syncrelay::router::UnknownSessionPolicy;
use syncrelay::server::{self, RelayState};
use tokio_tungstenite::tungstenite::Message;

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How long to wait before concluding that nothing was delivered.
const QUIET_PERIOD: Duration = Duration::from_millis(200);

async fn start_relay(policy: UnknownSessionPolicy) -> std::net::SocketAddr {
    let state = Arc::new(RelayState::new().with_unknown_session(policy));
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start relay");
    addr
}

async fn connect(addr: std::net::SocketAddr) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect failed");
    ws
}

async fn send_json(ws: &mut ClientWs, body: &Value) {
    ws.send(Message::Text(body.to_string().into()))
        .await
        .unwrap();
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut ClientWs) {
    if let Ok(Some(Ok(msg))) = tokio::time::timeout(QUIET_PERIOD, ws.next()).await {
        panic!("expected no message, got {msg:?}");
    }
}

async fn create_session(ws: &mut ClientWs, payload: Value) -> String {
    let mut body = payload;
    body["type"] = json!("create-session");
    send_json(ws, &body).await;
    let reply = recv_json(ws).await;
    assert_eq!(reply["type"], "created-session");
    reply["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn end_to_end_board_scenario() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    let s1 = create_session(&mut a, json!({"board": []})).await;

    send_json(&mut b, &json!({"type": "join", "sessionId": s1})).await;
    assert_eq!(
        recv_json(&mut b).await,
        json!({"type": "action", "sessionId": s1, "board": []})
    );

    send_json(&mut a, &json!({"type": "action", "sessionId": s1, "board": [1]})).await;
    let expected = json!({"type": "action", "sessionId": s1, "board": [1]});
    assert_eq!(recv_json(&mut a).await, expected);
    assert_eq!(recv_json(&mut b).await, expected);
}

#[tokio::test]
async fn join_after_two_actions_sees_only_the_last() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;
    let s1 = create_session(&mut a, json!({})).await;

    send_json(&mut a, &json!({"type": "action", "sessionId": s1, "x": 1, "keep": true})).await;
    recv_json(&mut a).await;
    send_json(&mut a, &json!({"type": "action", "sessionId": s1, "y": 2})).await;
    recv_json(&mut a).await;

    let mut late = connect(addr).await;
    send_json(&mut late, &json!({"type": "join", "sessionId": s1})).await;
    assert_eq!(
        recv_json(&mut late).await,
        json!({"type": "action", "sessionId": s1, "y": 2})
    );
}

#[tokio::test]
async fn broadcast_stays_inside_the_session() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut outsider = connect(addr).await;

    let s1 = create_session(&mut a, json!({"n": 0})).await;
    let _s2 = create_session(&mut outsider, json!({"n": 0})).await;

    send_json(&mut b, &json!({"type": "join", "sessionId": s1})).await;
    recv_json(&mut b).await;

    send_json(&mut b, &json!({"type": "action", "sessionId": s1, "n": 1})).await;
    assert_eq!(recv_json(&mut a).await["n"], 1);
    assert_eq!(recv_json(&mut b).await["n"], 1, "sender receives its own action");
    assert_silent(&mut outsider).await;
}

#[tokio::test]
async fn join_unknown_session_gets_no_reply() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;

    send_json(&mut a, &json!({"type": "join", "sessionId": "does-not-exist"})).await;
    assert_silent(&mut a).await;

    // The connection is still usable afterwards.
    let id = create_session(&mut a, json!({})).await;
    assert!(!id.is_empty());
}

#[tokio::test]
async fn action_unknown_session_is_not_created_by_default() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    send_json(&mut a, &json!({"type": "action", "sessionId": "ghost", "v": 1})).await;
    assert_silent(&mut a).await;

    send_json(&mut b, &json!({"type": "join", "sessionId": "ghost"})).await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn permissive_relay_creates_session_on_first_action() {
    let addr = start_relay(UnknownSessionPolicy::Create).await;
    let mut watcher = connect(addr).await;
    let mut writer = connect(addr).await;

    send_json(&mut watcher, &json!({"type": "join", "sessionId": "room-7"})).await;
    assert_silent(&mut watcher).await;

    send_json(&mut writer, &json!({"type": "action", "sessionId": "room-7", "v": 1})).await;
    assert_eq!(
        recv_json(&mut watcher).await,
        json!({"type": "action", "sessionId": "room-7", "v": 1})
    );

    let mut late = connect(addr).await;
    send_json(&mut late, &json!({"type": "join", "sessionId": "room-7"})).await;
    assert_eq!(recv_json(&mut late).await["v"], 1);
}

#[tokio::test]
async fn unknown_type_and_garbage_are_ignored() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;

    a.send(Message::Text("{{{".into())).await.unwrap();
    send_json(&mut a, &json!({"type": "teleport"})).await;
    send_json(&mut a, &json!({"no_type": true})).await;
    assert_silent(&mut a).await;

    let id = create_session(&mut a, json!({"ok": true})).await;
    assert!(!id.is_empty());
}

#[tokio::test]
async fn member_that_disconnects_stops_receiving_but_session_survives() {
    let addr = start_relay(UnknownSessionPolicy::Ignore).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let s1 = create_session(&mut a, json!({"v": 0})).await;

    send_json(&mut b, &json!({"type": "join", "sessionId": s1})).await;
    recv_json(&mut b).await;

    a.close(None).await.unwrap();
    drop(a);

    send_json(&mut b, &json!({"type": "action", "sessionId": s1, "v": 1})).await;
    assert_eq!(recv_json(&mut b).await["v"], 1);

    let mut c = connect(addr).await;
    send_json(&mut c, &json!({"type": "join", "sessionId": s1})).await;
    assert_eq!(recv_json(&mut c).await["v"], 1);
}
