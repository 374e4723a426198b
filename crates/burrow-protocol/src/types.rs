//! Core protocol types for burrow's wire format.
//!
//! Every message is a JSON object whose `type` field names its kind. The
//! set is closed: adding a kind means adding a variant here, and the
//! compiler then points at every `match` that must handle it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of an entity (player or mob).
///
/// Players and mobs share one id space so an action can target either.
/// Serialized as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// Identifier of a room in the world graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Requests a client may send.
///
/// `chat` travels in both directions and appears here and in
/// [`ServerMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Say something to everyone on the server.
    Chat {
        player_name: String,
        chat_message: String,
    },

    /// Register a player under `username`.
    Init { username: String },

    /// Perform a named action, optionally against another entity.
    Action {
        action: String,
        player: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<EntityId>,
    },

    /// Walk through an exit. `direction` is validated by the world, not
    /// here, so that a bad direction is a game-level rejection rather than
    /// a protocol error.
    Move { direction: String, player: EntityId },
}

impl ClientRequest {
    /// Every `type` discriminant a client may send.
    pub const TYPES: &'static [&'static str] = &["chat", "init", "action", "move"];

    /// The discriminant of this request, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Init { .. } => "init",
            Self::Action { .. } => "action",
            Self::Move { .. } => "move",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// The public view of a registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSchema {
    pub uid: EntityId,
    pub name: String,
    pub allowed_actions: BTreeSet<String>,
}

/// An entity entered or left a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChange {
    pub room_uid: RoomId,
    pub entity_uid: EntityId,
    pub entity_name: String,
    /// `false` means the entity left.
    pub enters: bool,
}

/// Messages the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A chat line relayed to everyone.
    Chat {
        player_name: String,
        chat_message: String,
    },

    /// Reply to `init`.
    RegistrationSuccessful { player: PlayerSchema },

    /// Direct answer to one of the client's own requests, usually a
    /// rejection ("no such target here", "you can't go that way").
    ActionResponse { response: String },

    /// Narration of something that happened during a tick.
    Update { message: String },

    /// Someone entered or left a room the recipient can see.
    RoomChange(RoomChange),

    /// Who is already in the room the recipient just entered.
    RoomInfo { entities: Vec<RoomChange> },

    /// The recipient's player died.
    #[serde(rename = "DEATH")]
    Death,
}

impl ServerMessage {
    /// Builds an `update` message.
    pub fn update(message: impl Into<String>) -> Self {
        Self::Update {
            message: message.into(),
        }
    }

    /// Builds an `action_response` message.
    pub fn action_response(response: impl Into<String>) -> Self {
        Self::ActionResponse {
            response: response.into(),
        }
    }

    /// The discriminant of this message, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::RegistrationSuccessful { .. } => "registration_successful",
            Self::ActionResponse { .. } => "action_response",
            Self::Update { .. } => "update",
            Self::RoomChange(_) => "room_change",
            Self::RoomInfo { .. } => "room_info",
            Self::Death => "DEATH",
        }
    }
}

#[cfg(test)]
mod tests {
    //! The client parses these exact JSON shapes, so the tests pin the
    //! serde attributes rather than round-tripping every variant.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&EntityId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&RoomId(7)).unwrap(), "7");
        assert_eq!(EntityId(42).to_string(), "E-42");
        assert_eq!(RoomId(7).to_string(), "R-7");
    }

    #[test]
    fn test_action_with_target_shape() {
        let req: ClientRequest = serde_json::from_value(json!({
            "type": "action", "action": "bite", "player": 1, "target": 2
        }))
        .unwrap();
        assert_eq!(
            req,
            ClientRequest::Action {
                action: "bite".into(),
                player: EntityId(1),
                target: Some(EntityId(2)),
            }
        );
    }

    #[test]
    fn test_action_without_target_omits_field() {
        let req: ClientRequest =
            serde_json::from_value(json!({"type": "action", "action": "spit", "player": 1}))
                .unwrap();
        assert!(matches!(req, ClientRequest::Action { target: None, .. }));

        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("target").is_none());
    }

    #[test]
    fn test_init_and_chat_shapes() {
        let init = serde_json::to_value(ClientRequest::Init {
            username: "xyf".into(),
        })
        .unwrap();
        assert_eq!(init, json!({"type": "init", "username": "xyf"}));

        let chat = serde_json::to_value(ServerMessage::Chat {
            player_name: "xyf".into(),
            chat_message: "hi".into(),
        })
        .unwrap();
        assert_eq!(
            chat,
            json!({"type": "chat", "player_name": "xyf", "chat_message": "hi"})
        );
    }

    #[test]
    fn test_registration_successful_shape() {
        let msg = ServerMessage::RegistrationSuccessful {
            player: PlayerSchema {
                uid: EntityId(5),
                name: "A5Rocks".into(),
                allowed_actions: ["spit".to_string(), "bite".to_string()].into(),
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "registration_successful");
        assert_eq!(value["player"]["uid"], 5);
        // BTreeSet keeps the list sorted on the wire.
        assert_eq!(value["player"]["allowed_actions"], json!(["bite", "spit"]));
    }

    #[test]
    fn test_room_change_is_flat() {
        let msg = ServerMessage::RoomChange(RoomChange {
            room_uid: RoomId(3),
            entity_uid: EntityId(9),
            entity_name: "anta".into(),
            enters: false,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "room_change",
                "room_uid": 3,
                "entity_uid": 9,
                "entity_name": "anta",
                "enters": false
            })
        );
    }

    #[test]
    fn test_room_info_lists_entries() {
        let msg = ServerMessage::RoomInfo {
            entities: vec![RoomChange {
                room_uid: RoomId(1),
                entity_uid: EntityId(2),
                entity_name: "antb".into(),
                enters: true,
            }],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "room_info");
        assert_eq!(value["entities"][0]["entity_name"], "antb");
        assert_eq!(value["entities"][0]["enters"], true);

        let back: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_death_has_no_payload() {
        assert_eq!(
            serde_json::to_value(ServerMessage::Death).unwrap(),
            json!({"type": "DEATH"})
        );
        let back: ServerMessage = serde_json::from_str(r#"{"type":"DEATH"}"#).unwrap();
        assert_eq!(back, ServerMessage::Death);
    }

    #[test]
    fn test_kind_matches_wire_discriminant() {
        let msg = ServerMessage::action_response("nope");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], msg.kind());

        let req = ClientRequest::Move {
            direction: "west".into(),
            player: EntityId(1),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], req.kind());
        assert!(ClientRequest::TYPES.contains(&req.kind()));
    }
}
