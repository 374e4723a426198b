//! Error types for the protocol layer.

/// Errors raised while turning frames into messages or back.
///
/// None of these are fatal to a session: the connection handler logs them
/// and answers the client, then keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not valid JSON or a known message has a bad body
    /// (missing field, wrong field type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is a JSON object without a string `type` field.
    #[error("message has no type discriminant")]
    MissingType,

    /// The `type` discriminant names no message in the closed set.
    #[error("unrecognized message type {0:?}")]
    UnknownMessageType(String),
}
