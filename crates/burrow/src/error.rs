//! Unified error type for the burrow server.

use burrow_protocol::ProtocolError;
use burrow_session::SessionError;
use burrow_transport::TransportError;
use burrow_world::WorldError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BurrowError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode or unknown message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Bad map or placement configuration, or the game loop is gone.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Username taken, session missing.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Reading configuration from disk.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
