//! Shared protocol definitions for the `SyncRelay` wire format.

pub mod codec;
pub mod message;
pub mod session;
