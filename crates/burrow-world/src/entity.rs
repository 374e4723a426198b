//! Players and mobs.
//!
//! Entities never point at rooms directly: they hold a [`RoomId`] and the
//! room holds their [`EntityId`]. The [`Game`](crate::Game) keeps both
//! sides in agreement.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use burrow_protocol::{EntityId, PlayerSchema, RoomId};

use crate::map::Direction;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

fn next_entity_id() -> EntityId {
    EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
}

/// Experience needed per level.
pub const XP_PER_LEVEL: u64 = 100;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One queued unit of work, resolved on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Walk through an exit. The direction is checked at resolution.
    Move { direction: String },
    /// A named action, with or without a target.
    Action {
        action: String,
        target: Option<EntityId>,
    },
    /// Say something to everyone.
    Chat { message: String },
}

impl Command {
    pub fn movement(direction: impl Into<String>) -> Self {
        Self::Move {
            direction: direction.into(),
        }
    }

    pub fn action(action: impl Into<String>, target: Option<EntityId>) -> Self {
        Self::Action {
            action: action.into(),
            target,
        }
    }

    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Whether a player takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// Terminal until an explicit revive. Holds no room and accepts no
    /// commands.
    Dead,
}

/// A client-controlled entity.
#[derive(Debug, Clone)]
pub struct Player {
    id: EntityId,
    name: String,
    allowed_actions: BTreeSet<String>,
    health: u32,
    max_health: u32,
    experience: u64,
    liveness: Liveness,
    room: Option<RoomId>,
    queue: VecDeque<Command>,
}

impl Player {
    pub const DEFAULT_HEALTH: u32 = 20;

    /// Creates a player with a fresh id. It is not in the world until
    /// [`Game::add_player`](crate::Game::add_player) places it.
    pub fn new<I, S>(name: impl Into<String>, allowed_actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: next_entity_id(),
            name: name.into(),
            allowed_actions: allowed_actions.into_iter().map(Into::into).collect(),
            health: Self::DEFAULT_HEALTH,
            max_health: Self::DEFAULT_HEALTH,
            experience: 0,
            liveness: Liveness::Alive,
            room: None,
            queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_actions(&self) -> &BTreeSet<String> {
        &self.allowed_actions
    }

    pub fn can(&self, action: &str) -> bool {
        self.allowed_actions.contains(action)
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn level(&self) -> u64 {
        1 + self.experience / XP_PER_LEVEL
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    /// The room the player is in. `None` before placement and while dead.
    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    /// Appends a command to the FIFO queue.
    ///
    /// Returns `false`, dropping the command, if the player is dead.
    pub fn queue(&mut self, command: Command) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.queue.push_back(command);
        true
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// The wire view sent on registration.
    pub fn schema(&self) -> PlayerSchema {
        PlayerSchema {
            uid: self.id,
            name: self.name.clone(),
            allowed_actions: self.allowed_actions.clone(),
        }
    }

    /// Pops the one command this tick may resolve.
    pub(crate) fn next_command(&mut self) -> Option<Command> {
        if !self.is_alive() {
            return None;
        }
        self.queue.pop_front()
    }

    pub(crate) fn set_room(&mut self, room: Option<RoomId>) {
        self.room = room;
    }

    /// Returns the remaining health.
    pub(crate) fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }

    /// Returns the new level if this gain crossed a level boundary.
    pub(crate) fn gain_experience(&mut self, amount: u64) -> Option<u64> {
        let before = self.level();
        self.experience += amount;
        (self.level() > before).then(|| self.level())
    }

    pub(crate) fn die(&mut self) {
        self.liveness = Liveness::Dead;
        self.queue.clear();
        self.room = None;
    }

    pub(crate) fn revive(&mut self, room: RoomId) {
        self.liveness = Liveness::Alive;
        self.queue.clear();
        self.health = self.max_health;
        self.room = Some(room);
    }
}

// ---------------------------------------------------------------------------
// Mob
// ---------------------------------------------------------------------------

/// What a mob can see when deciding what to do.
#[derive(Debug, Clone)]
pub struct MobContext {
    pub tick: u64,
    pub mob: EntityId,
    pub room: RoomId,
    /// Other entities in the same room.
    pub others: Vec<EntityId>,
    /// Exits leading to walkable rooms.
    pub exits: Vec<Direction>,
}

/// Decision strategy for a mob.
///
/// Called once per tick. A returned command is resolved with the same
/// rules as a player's queued command.
pub trait MobBehavior: Send + 'static {
    fn decide(&mut self, ctx: &MobContext) -> Option<Command>;
}

/// Does nothing, ever. The default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

impl MobBehavior for Idle {
    fn decide(&mut self, _ctx: &MobContext) -> Option<Command> {
        None
    }
}

/// A server-controlled entity.
pub struct Mob {
    id: EntityId,
    name: String,
    allowed_actions: BTreeSet<String>,
    health: u32,
    room: Option<RoomId>,
    behavior: Box<dyn MobBehavior>,
}

impl Mob {
    /// Creates an [`Idle`] mob with a fresh id.
    pub fn new<I, S>(name: impl Into<String>, allowed_actions: I, health: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: next_entity_id(),
            name: name.into(),
            allowed_actions: allowed_actions.into_iter().map(Into::into).collect(),
            health,
            room: None,
            behavior: Box::new(Idle),
        }
    }

    /// Replaces the decision strategy.
    pub fn with_behavior(mut self, behavior: impl MobBehavior) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn can(&self, action: &str) -> bool {
        self.allowed_actions.contains(action)
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    pub(crate) fn decide(&mut self, ctx: &MobContext) -> Option<Command> {
        self.behavior.decide(ctx)
    }

    pub(crate) fn set_room(&mut self, room: Option<RoomId>) {
        self.room = room;
    }

    pub(crate) fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }
}

impl fmt::Debug for Mob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("health", &self.health)
            .field("room", &self.room)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let p = Player::new("xyf", ["bite"]);
        let m = Mob::new("anta", ["bite"], 5);
        assert_ne!(p.id(), m.id());
    }

    #[test]
    fn test_queue_is_fifo_and_one_per_pop() {
        let mut p = Player::new("xyf", ["bite"]);
        assert!(p.queue(Command::movement("north")));
        assert!(p.queue(Command::chat("hi")));
        assert_eq!(p.next_command(), Some(Command::movement("north")));
        assert_eq!(p.pending_commands(), 1);
        assert_eq!(p.next_command(), Some(Command::chat("hi")));
        assert_eq!(p.next_command(), None);
    }

    #[test]
    fn test_dead_player_rejects_and_clears_commands() {
        let mut p = Player::new("xyf", ["bite"]);
        p.queue(Command::chat("one"));
        p.die();
        assert_eq!(p.pending_commands(), 0);
        assert!(!p.queue(Command::chat("two")));
        assert_eq!(p.next_command(), None);
        assert_eq!(p.room(), None);
    }

    #[test]
    fn test_revive_restores_health() {
        let mut p = Player::new("xyf", ["bite"]);
        p.take_damage(50);
        assert_eq!(p.health(), 0);
        p.die();
        p.revive(RoomId(4));
        assert!(p.is_alive());
        assert_eq!(p.health(), Player::DEFAULT_HEALTH);
        assert_eq!(p.room(), Some(RoomId(4)));
    }

    #[test]
    fn test_experience_levels() {
        let mut p = Player::new("xyf", ["bite"]);
        assert_eq!(p.level(), 1);
        assert_eq!(p.gain_experience(60), None);
        assert_eq!(p.gain_experience(60), Some(2));
        assert_eq!(p.experience(), 120);
    }

    #[test]
    fn test_schema_lists_actions() {
        let p = Player::new("A5Rocks", ["spit", "bite"]);
        let schema = p.schema();
        assert_eq!(schema.uid, p.id());
        assert_eq!(schema.name, "A5Rocks");
        assert_eq!(schema.allowed_actions.len(), 2);
    }
}
