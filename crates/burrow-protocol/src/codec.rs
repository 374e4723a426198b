//! Codec trait and implementations for text frames.
//!
//! The protocol layer doesn't care HOW messages are serialized, only that
//! something implements [`Codec`]. [`JsonCodec`] is the one clients speak
//! today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values into text frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, frame: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use burrow_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let frame = codec.encode(&ServerMessage::Death).unwrap();
/// assert_eq!(frame, r#"{"type":"DEATH"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, frame: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}

/// Decodes a client frame, telling an unknown discriminant apart from a
/// malformed body.
///
/// serde reports both as a generic decode failure; the handler wants to
/// answer them differently, so the `type` field is inspected first.
#[cfg(feature = "json")]
pub fn decode_request(frame: &str) -> Result<crate::ClientRequest, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(frame).map_err(ProtocolError::Decode)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !crate::ClientRequest::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_owned()));
    }
    serde_json::from_value(value).map_err(ProtocolError::Decode)
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientRequest, EntityId};

    #[test]
    fn test_decode_request_known_type() {
        let req = decode_request(r#"{"type":"move","direction":"north","player":3}"#).unwrap();
        assert_eq!(
            req,
            ClientRequest::Move {
                direction: "north".into(),
                player: EntityId(3),
            }
        );
    }

    #[test]
    fn test_decode_request_unknown_type() {
        let err = decode_request(r#"{"type":"teleport","player":3}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(ref t) if t == "teleport"));
    }

    #[test]
    fn test_decode_request_missing_type() {
        let err = decode_request(r#"{"username":"xyf"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingType));
    }

    #[test]
    fn test_decode_request_bad_body_is_decode_error() {
        // Known discriminant, but `player` is not an integer.
        let err = decode_request(r#"{"type":"move","direction":"north","player":"me"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_request_garbage() {
        let err = decode_request("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_server_message_is_not_a_request() {
        let err = decode_request(r#"{"type":"DEATH"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(_)));
    }
}
