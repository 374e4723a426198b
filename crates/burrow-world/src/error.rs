//! Error types for the world layer.

use burrow_protocol::EntityId;

/// Errors raised by world construction and by the game actor handle.
///
/// Bad requests from players are *not* errors here: they resolve to a
/// rejection outcome and reach the player as a message.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A map record names a room type outside the known set.
    #[error("unknown room type {kind:?} at ({x}, {y})")]
    UnknownRoomKind { kind: String, x: i32, y: i32 },

    /// Map data is not a JSON list of `{type, x, y}` records.
    #[error("invalid map data: {0}")]
    MapFormat(#[from] serde_json::Error),

    /// Startup placement named a coordinate with no room.
    #[error("no room at ({0}, {1})")]
    NoRoomAt(i32, i32),

    /// Startup placement named a room entities cannot stand in.
    #[error("room at ({0}, {1}) is not walkable")]
    NotWalkable(i32, i32),

    /// The player is not registered with the game.
    #[error("player {0} not found")]
    PlayerNotFound(EntityId),

    /// The game actor has stopped and no longer takes commands.
    #[error("game loop is not running")]
    Unavailable,
}
