//! Wire protocol for burrow.
//!
//! This crate defines the closed set of messages exchanged between a game
//! client and the server:
//!
//! - **Types** ([`ClientRequest`], [`ServerMessage`], [`EntityId`],
//!   [`RoomId`]): the shapes that travel on the wire, each tagged with a
//!   `type` discriminant.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those shapes are
//!   turned into text frames and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong at the boundary.
//!
//! The simulation core only builds and consumes these types. Turning them
//! into bytes is the connection handler's job.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::{JsonCodec, decode_request};
pub use error::ProtocolError;
pub use types::{ClientRequest, EntityId, PlayerSchema, RoomChange, RoomId, ServerMessage};
