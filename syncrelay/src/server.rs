//! Relay server core: shared state, WebSocket handler, and server startup.
//!
//! The server accepts WebSocket connections on `/ws`, registers each one
//! with the [`Hub`], and feeds every inbound frame to the
//! [`router`](crate::router) in arrival order. Outbound frames go through a
//! per-connection channel drained by a writer task.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use syncrelay_proto::message::MAX_MESSAGE_SIZE;
use tokio::sync::mpsc;

use crate::hub::{ConnectionId, Hub};
use crate::registry::SessionRegistry;
use crate::router::{self, RouterConfig, UnknownSessionPolicy};

/// Shared relay state: session registry, connection hub, and policies.
pub struct RelayState {
    /// All sessions known to this process.
    pub registry: SessionRegistry,
    /// Live connections and their session groups.
    pub hub: Hub,
    /// Routing options such as the unknown-session policy.
    pub router: RouterConfig,
    /// Frames larger than this many bytes are dropped unread.
    max_message_size: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates relay state with an empty registry and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
            hub: Hub::new(),
            router: RouterConfig::default(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Creates relay state from resolved configuration values.
    #[must_use]
    pub fn with_config(max_message_size: usize, router: RouterConfig) -> Self {
        Self {
            max_message_size,
            router,
            ..Self::new()
        }
    }

    /// Returns this state with a different unknown-session policy.
    #[must_use]
    pub fn with_unknown_session(mut self, policy: UnknownSessionPolicy) -> Self {
        self.router.unknown_session = policy;
        self
    }
}

/// Handles an upgraded WebSocket connection.
///
/// The connection lifecycle:
/// 1. Register with the hub and obtain a [`ConnectionId`].
/// 2. Spawn a writer task draining the connection's channel.
/// 3. Read frames and route each one before reading the next.
/// 4. On disconnect, remove the connection from the hub and all groups.
///    Sessions are left untouched.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = state.hub.connect(tx);
    tracing::info!(conn_id = %conn_id, "connected");

    // Spawn a writer task that forwards messages from the channel to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn_id = %conn_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Reader loop: frames from one connection are handled strictly in order.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_inbound(&reader_state, conn_id, text.as_str());
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => handle_inbound(&reader_state, conn_id, text),
                    Err(e) => {
                        tracing::warn!(conn_id = %conn_id, error = %e, "binary frame is not UTF-8, dropped");
                    }
                },
                Message::Close(_) => {
                    tracing::info!(conn_id = %conn_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore ping and pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.hub.disconnect(conn_id);
    tracing::info!(conn_id = %conn_id, "disconnected");
}

/// Size-checks and routes one inbound message, logging anything dropped.
fn handle_inbound(state: &RelayState, conn_id: ConnectionId, text: &str) {
    if text.len() > state.max_message_size {
        tracing::warn!(
            conn_id = %conn_id,
            size = text.len(),
            max = state.max_message_size,
            "message exceeds size limit, dropped"
        );
        return;
    }

    tracing::trace!(conn_id = %conn_id, body = %text, "received message");
    if let Err(e) = router::handle_text(state, conn_id, text) {
        tracing::warn!(conn_id = %conn_id, error = %e, "message dropped");
    }
}

/// Starts the relay server with a pre-configured [`RelayState`] and returns
/// the bound address and a join handle.
///
/// Used by both `main.rs` and test code; bind `127.0.0.1:0` for an
/// OS-assigned port.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
