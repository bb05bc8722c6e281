//! Transport abstraction layer for Hearthwire.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how packet bodies reach the server, plus the framed TCP implementation
//! the game client speaks ([`TcpTransport`], [`FrameCodec`]).
//!
//! The transport knows nothing about opcodes or encryption. It moves
//! whole frame bodies (opcode + payload) in and out, in order.

#![allow(async_fn_in_trait)]

mod error;
mod framing;
mod tcp;

pub use error::TransportError;
pub use framing::{FRAME_HEADER_LEN, FRAME_MARKER, FrameCodec, MAX_FRAME_BODY};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;

use bytes::Bytes;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that moves frame bodies in both directions.
///
/// Frames are delivered strictly in the order they arrived on the wire.
/// The packet cipher depends on that ordering, so implementations must
/// never reorder or interleave partial frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame body (opcode + payload) to the remote peer.
    async fn send(&self, body: Bytes) -> Result<(), Self::Error>;

    /// Receives the next frame body from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Bytes>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
