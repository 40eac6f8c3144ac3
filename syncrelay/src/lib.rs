//! `SyncRelay` server library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts WebSocket connections, keeps an in-memory registry of sessions,
//! and broadcasts each session's latest state to every connection that has
//! joined it.

pub mod config;
pub mod hub;
pub mod registry;
pub mod router;
pub mod server;
