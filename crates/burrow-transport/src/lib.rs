//! Transport layer for burrow.
//!
//! Game messages are JSON text frames. Accepting is split in two steps:
//! [`Transport::accept`] only takes the TCP stream, and
//! [`PendingConnection::upgrade`] runs the protocol handshake, so the
//! handshake can happen on the connection's own task. An upgraded
//! connection is handed out as two halves: an [`Inbound`] half read by the
//! connection handler and an [`Outbound`] half owned by a writer task.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingWebSocket, WebSocketInbound, WebSocketOutbound, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
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

/// A freshly accepted connection, already split into its two halves.
pub struct Accepted<I, O> {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub inbound: I,
    pub outbound: O,
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    type Inbound: Inbound;
    type Outbound: Outbound;
    type Pending: PendingConnection<Inbound = Self::Inbound, Outbound = Self::Outbound>;

    /// Waits for the next client. Returns as soon as the stream is
    /// accepted; nothing has been read from it yet.
    async fn accept(&mut self) -> Result<Self::Pending, TransportError>;

    /// The address the listener is bound to.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted stream that has not completed the protocol handshake.
pub trait PendingConnection: Send + 'static {
    type Inbound: Inbound;
    type Outbound: Outbound;

    fn id(&self) -> ConnectionId;

    fn peer(&self) -> SocketAddr;

    /// Completes the handshake and splits the connection.
    ///
    /// Fails with [`TransportError::Handshake`] if the peer does not finish
    /// the handshake in time.
    async fn upgrade(self) -> Result<Accepted<Self::Inbound, Self::Outbound>, TransportError>;
}

/// The read half of a connection.
pub trait Inbound: Send + 'static {
    /// Receives the next text frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// The write half of a connection.
pub trait Outbound: Send + 'static {
    /// Sends one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Sends a close frame and flushes.
    async fn close(&mut self) -> Result<(), TransportError>;
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
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        assert_eq!(ConnectionId::new(1), ConnectionId::new(1));
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
