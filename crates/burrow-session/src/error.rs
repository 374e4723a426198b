//! Error types for the session layer.

use burrow_protocol::EntityId;

/// Errors that can occur while registering or looking up sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Another connected player already uses this name.
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    /// The entity already has a session.
    #[error("player {0} already has an active session")]
    AlreadyConnected(EntityId),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(EntityId),
}
