//! Connection hub: per-connection outbound channels and broadcast groups.
//!
//! Every accepted WebSocket gets a [`ConnectionId`] and an unbounded channel
//! drained by its writer task. Groups are keyed by [`SessionId`]; a
//! connection may be in any number of groups at once. All sends are
//! fire-and-forget: a message is handed to the channel and never retried.
//!
//! Every method is synchronous. Handing a frame to an unbounded channel
//! never blocks, so the router can queue frames while it holds the session
//! registry lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use syncrelay_proto::codec;
use syncrelay_proto::message::ServerMessage;
use syncrelay_proto::session::SessionId;
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Process-unique identifier of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of live connections and the groups they belong to.
pub struct Hub {
    /// Maps each connection to the sender half of its writer channel.
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
    /// Members of each broadcast group.
    groups: RwLock<HashMap<SessionId, HashSet<ConnectionId>>>,
    next_id: AtomicU64,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection and returns its id.
    pub fn connect(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let conn_id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.write().insert(conn_id, sender);
        conn_id
    }

    /// Removes a connection and drops it from every group.
    ///
    /// Groups left without members are removed. Returns `true` if the
    /// connection was registered.
    pub fn disconnect(&self, conn_id: ConnectionId) -> bool {
        let existed = self.connections.write().remove(&conn_id).is_some();

        let mut groups = self.groups.write();
        groups.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
        drop(groups);

        existed
    }

    /// Adds a connection to a group. Joining twice is a no-op.
    pub fn join_group(&self, conn_id: ConnectionId, group: &SessionId) {
        let mut groups = self.groups.write();
        groups.entry(group.clone()).or_default().insert(conn_id);
    }

    /// Sends a message to a single connection.
    ///
    /// Returns `true` if the message was handed to the connection's writer.
    pub fn send(&self, conn_id: ConnectionId, msg: &ServerMessage) -> bool {
        let Some(frame) = encode_frame(msg) else {
            return false;
        };
        let Some(sender) = self.connections.read().get(&conn_id).cloned() else {
            tracing::debug!(conn_id = %conn_id, "send to unknown connection dropped");
            return false;
        };
        sender.send(frame).is_ok()
    }

    /// Sends a message to every member of a group.
    ///
    /// The message is encoded once. Returns the number of connections it was
    /// handed to; members whose writer has gone away are skipped.
    pub fn broadcast_to_group(&self, group: &SessionId, msg: &ServerMessage) -> usize {
        let members: Vec<ConnectionId> = match self.groups.read().get(group) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        let Some(frame) = encode_frame(msg) else {
            return 0;
        };

        let conns = self.connections.read();
        let mut delivered = 0;
        for conn_id in members {
            if let Some(sender) = conns.get(&conn_id)
                && sender.send(frame.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        drop(conns);

        tracing::debug!(session_id = %group, delivered, "broadcast to group");
        delivered
    }

    /// Returns the current members of a group.
    pub fn group_members(&self, group: &SessionId) -> Vec<ConnectionId> {
        let groups = self.groups.read();
        let mut members: Vec<ConnectionId> = groups
            .get(group)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        drop(groups);
        members.sort_unstable();
        members
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Send a WebSocket Close frame to all connected clients.
    ///
    /// Each writer task forwards the close frame, which ends the connection
    /// from the client's side. Used for graceful shutdown.
    pub fn close_all_connections(&self) {
        let conns = self.connections.read();
        for (conn_id, sender) in conns.iter() {
            tracing::info!(conn_id = %conn_id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Encodes a server message into a WebSocket text frame.
fn encode_frame(msg: &ServerMessage) -> Option<Message> {
    match codec::encode_server(msg) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, kind = msg.kind(), "failed to encode outbound message");
            None
        }
    }
}
