//! The simulation core of burrow.
//!
//! A static graph of rooms built from map records, the players and mobs
//! standing in them, and the [`Game`] that advances everything one tick at
//! a time. Everything observable leaves the game as an [`OutboundEvent`]
//! on an ordered queue; this crate knows nothing about connections.
//!
//! # Key types
//!
//! - [`RoomGraph`] and [`Room`]: topology and per-room occupancy
//! - [`Player`], [`Mob`] and [`MobBehavior`]: the entities
//! - [`Game`]: placement, movement and the tick
//! - [`GameHandle`]: talk to a game running in its own task

mod action;
mod actor;
mod entity;
mod error;
mod game;
mod map;

pub use action::{ActionDef, CATALOG, FLEE, default_player_actions, lookup as lookup_action};
pub use actor::{GameHandle, spawn_game};
pub use entity::{Command, Idle, Liveness, Mob, MobBehavior, MobContext, Player, XP_PER_LEVEL};
pub use error::WorldError;
pub use game::{
    ActionEvent, EventReceiver, Game, OutboundEvent, Outcome, Recipient, XP_PER_KILL,
};
pub use map::{Direction, InvalidDirection, MapRecord, Room, RoomGraph, RoomKind};
