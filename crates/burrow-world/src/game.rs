//! The game orchestrator: owns rooms, players and mobs, and runs the tick.
//!
//! Within one tick, events leave in a fixed order: mob outcomes, then
//! player outcomes, then the room entry/exit buffers. Inside each group
//! entities and rooms are visited in id order. Ids are handed out
//! monotonically, so this is also registration order and does not change
//! from tick to tick.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use burrow_protocol::{EntityId, RoomChange, RoomId, ServerMessage};
use rand::seq::IndexedRandom;
use tokio::sync::mpsc;

use crate::action::{self, FLEE};
use crate::entity::{Command, Mob, MobContext, Player};
use crate::map::{Direction, MapRecord, Room, RoomGraph};
use crate::WorldError;

/// Experience granted for killing a mob.
pub const XP_PER_KILL: u64 = 50;

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Who an outbound message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player.
    All,
    /// One player.
    Player(EntityId),
    /// A fixed list of players, resolved when the event was produced.
    /// May be empty when nobody was there to see it.
    Players(Vec<EntityId>),
}

impl Recipient {
    /// Whether `player` receives a message sent to this recipient.
    pub fn includes(&self, player: EntityId) -> bool {
        match self {
            Self::All => true,
            Self::Player(id) => *id == player,
            Self::Players(ids) => ids.contains(&player),
        }
    }
}

/// One entry of the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    /// Tick during which the event was produced. 0 for events produced
    /// before the first tick.
    pub tick: u64,
    pub recipient: Recipient,
    pub message: ServerMessage,
}

/// Consumer side of the outbound queue.
pub type EventReceiver = mpsc::UnboundedReceiver<OutboundEvent>;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of resolving one entity's turn.
///
/// Matched exhaustively when outcomes become protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was queued.
    Idle,
    Moved {
        from: RoomId,
        to: RoomId,
        direction: Direction,
        fled: bool,
    },
    /// The move was not possible: unknown direction, no exit, or an exit
    /// into a room that cannot be entered.
    Blocked { direction: String },
    /// An action resolved in `room`, producing at least one event.
    Acted {
        room: RoomId,
        events: Vec<ActionEvent>,
    },
    Chatted { message: String },
    /// The command was invalid; the reason is shown to the actor.
    Rejected(String),
}

/// Something an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    /// An untargeted flourish.
    Performed {
        actor: EntityId,
        actor_name: String,
        verb: &'static str,
    },
    Damaged {
        actor: EntityId,
        actor_name: String,
        target: EntityId,
        target_name: String,
        verb: &'static str,
        amount: u32,
        remaining: u32,
    },
    Killed {
        victim: EntityId,
        victim_name: String,
        killer_name: String,
        victim_was_player: bool,
    },
    LevelUp { player: EntityId, level: u64 },
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// The aggregate root of the simulation.
///
/// Only the owner of the `Game` mutates it; in the server that is the game
/// actor, which runs a whole tick without awaiting.
pub struct Game {
    graph: RoomGraph,
    players: BTreeMap<EntityId, Player>,
    mobs: BTreeMap<EntityId, Mob>,
    tick: u64,
    started_at_ms: u64,
    out: mpsc::UnboundedSender<OutboundEvent>,
}

impl Game {
    /// Creates a game over `graph` and returns the outbound queue's
    /// consumer end.
    pub fn new(graph: RoomGraph) -> (Self, EventReceiver) {
        let (out, events) = mpsc::unbounded_channel();
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(whole_millis)
            .unwrap_or_default();
        let game = Self {
            graph,
            players: BTreeMap::new(),
            mobs: BTreeMap::new(),
            tick: 0,
            started_at_ms,
            out,
        };
        (game, events)
    }

    /// Builds the room graph from `records`, then the game.
    pub fn from_records(records: &[MapRecord]) -> Result<(Self, EventReceiver), WorldError> {
        Ok(Self::new(RoomGraph::build(records)?))
    }

    pub fn graph(&self) -> &RoomGraph {
        &self.graph
    }

    pub fn room_at(&self, x: i32, y: i32) -> Option<&Room> {
        self.graph.room_at(x, y)
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.mobs.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn mobs(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.values()
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Wall-clock start of the game, in ms since the Unix epoch.
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Puts a new player into the world at `(x, y)`.
    ///
    /// Returns `false` and changes nothing if a player with the same id is
    /// already registered, or if there is no walkable room there. On success the player receives the room's current
    /// occupants and the room buffers an entry event.
    pub fn add_player(&mut self, mut player: Player, x: i32, y: i32) -> bool {
        if self.players.contains_key(&player.id()) {
            tracing::warn!(player_id = %player.id(), "player already registered");
            return false;
        }
        let Some(room_id) = self.walkable_room_at(x, y) else {
            return false;
        };
        let id = player.id();
        player.set_room(Some(room_id));
        self.enter_room(room_id, id, player.name());
        tracing::info!(player_id = %id, name = player.name(), %room_id, "player added");
        self.players.insert(id, player);
        self.send_room_info(id, room_id);
        true
    }

    /// Puts a mob into the world at `(x, y)`.
    ///
    /// Mob placement is startup configuration, so a bad coordinate is a
    /// configuration error for the caller to abort on.
    pub fn add_mob(&mut self, mut mob: Mob, x: i32, y: i32) -> Result<EntityId, WorldError> {
        let room = self.graph.room_at(x, y).ok_or(WorldError::NoRoomAt(x, y))?;
        if !room.walkable() {
            return Err(WorldError::NotWalkable(x, y));
        }
        let room_id = room.id();
        let id = mob.id();
        mob.set_room(Some(room_id));
        self.enter_room(room_id, id, mob.name());
        tracing::debug!(mob_id = %id, name = mob.name(), %room_id, "mob added");
        self.mobs.insert(id, mob);
        Ok(id)
    }

    /// Takes a player out of the world, e.g. on disconnect.
    pub fn remove_player(&mut self, id: EntityId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        if let Some(room_id) = player.room() {
            self.leave_room(room_id, id, player.name());
        }
        tracing::info!(player_id = %id, "player removed");
        Some(player)
    }

    /// Brings a dead player back at `(x, y)` with full health and an empty
    /// queue.
    ///
    /// Returns `false` if the player is unknown, not dead, or the target
    /// room is absent or not walkable.
    pub fn revive_player(&mut self, id: EntityId, x: i32, y: i32) -> bool {
        let Some(room_id) = self.walkable_room_at(x, y) else {
            return false;
        };
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if player.is_alive() {
            return false;
        }
        player.revive(room_id);
        let name = player.name().to_owned();
        self.enter_room(room_id, id, &name);
        tracing::info!(player_id = %id, %room_id, "player revived");
        self.send_room_info(id, room_id);
        true
    }

    /// Appends a command to a player's queue.
    ///
    /// Returns `Ok(false)` if the player is dead; the player is told so.
    pub fn enqueue(&mut self, id: EntityId, command: Command) -> Result<bool, WorldError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(WorldError::PlayerNotFound(id))?;
        if player.queue(command) {
            return Ok(true);
        }
        self.emit(
            Recipient::Player(id),
            ServerMessage::action_response("You are dead."),
        );
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Moves a living player one room in `direction`.
    ///
    /// Returns `false` without touching any state if `direction` is not a
    /// cardinal direction, there is no exit that way, or the exit leads to
    /// a room that is not walkable. On success the player leaves the old
    /// room and enters the new one in a single step, and both rooms buffer
    /// the change.
    pub fn move_player(&mut self, id: EntityId, direction: &str) -> bool {
        if !self.players.get(&id).is_some_and(Player::is_alive) {
            return false;
        }
        self.move_entity(id, direction).is_some()
    }

    fn move_entity(&mut self, id: EntityId, direction: &str) -> Option<(RoomId, RoomId, Direction)> {
        let direction: Direction = direction.parse().ok()?;
        let from = self.entity_room(id)?;
        let to = self.graph.link(from, direction)?;
        if !self.graph.room(to)?.walkable() {
            return None;
        }

        let name = self.entity_name(id)?;
        self.leave_room(from, id, &name);
        self.enter_room(to, id, &name);
        if let Some(player) = self.players.get_mut(&id) {
            player.set_room(Some(to));
        } else if let Some(mob) = self.mobs.get_mut(&id) {
            mob.set_room(Some(to));
        }
        Some((from, to, direction))
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Runs one simulation step.
    ///
    /// 1. Each mob's behavior may resolve one command.
    /// 2. Each living player resolves at most one queued command.
    /// 3. Every room's entry/exit buffer is appended to the outbound
    ///    queue and cleared. Changes buffered since the previous tick
    ///    (placements, removals) go out here as well.
    pub fn tick(&mut self) {
        self.tick += 1;

        let mob_ids: Vec<EntityId> = self.mobs.keys().copied().collect();
        for id in mob_ids {
            if let Some(outcome) = self.resolve_mob(id) {
                self.publish(id, outcome);
            }
        }

        let player_ids: Vec<EntityId> = self.players.keys().copied().collect();
        for id in player_ids {
            let outcome = self.resolve_player(id);
            self.publish(id, outcome);
        }

        for room_id in self.graph.room_ids() {
            let changes = match self.graph.room_mut(room_id) {
                Some(room) => room.take_events(),
                None => continue,
            };
            for change in changes {
                let mut audience = self.audience(room_id);
                if self.players.contains_key(&change.entity_uid)
                    && !audience.contains(&change.entity_uid)
                {
                    audience.push(change.entity_uid);
                }
                self.emit(Recipient::Players(audience), ServerMessage::RoomChange(change));
            }
        }

        debug_assert!(self.is_consistent(), "room membership out of sync");
        tracing::trace!(tick = self.tick, "tick complete");
    }

    /// Dequeues and resolves one command for a player.
    pub fn resolve_player(&mut self, id: EntityId) -> Outcome {
        let Some(command) = self.players.get_mut(&id).and_then(Player::next_command) else {
            return Outcome::Idle;
        };
        self.execute(id, command)
    }

    fn resolve_mob(&mut self, id: EntityId) -> Option<Outcome> {
        let mob = self.mobs.get(&id)?;
        let room_id = mob.room()?;
        let room = self.graph.room(room_id)?;
        let ctx = MobContext {
            tick: self.tick,
            mob: id,
            room: room_id,
            others: room.occupants().iter().copied().filter(|e| *e != id).collect(),
            exits: self.walkable_exits(room_id),
        };
        let command = self.mobs.get_mut(&id)?.decide(&ctx)?;
        Some(self.execute(id, command))
    }

    fn execute(&mut self, actor: EntityId, command: Command) -> Outcome {
        match command {
            Command::Move { direction } => match self.move_entity(actor, &direction) {
                Some((from, to, direction)) => Outcome::Moved {
                    from,
                    to,
                    direction,
                    fled: false,
                },
                None => Outcome::Blocked { direction },
            },
            Command::Action { action, target } => self.perform(actor, &action, target),
            Command::Chat { message } => Outcome::Chatted { message },
        }
    }

    fn perform(&mut self, actor: EntityId, action: &str, target: Option<EntityId>) -> Outcome {
        let Some(room_id) = self.entity_room(actor) else {
            return Outcome::Rejected("You are not anywhere.".into());
        };
        if !self.entity_can(actor, action) {
            return Outcome::Rejected(format!("You don't know how to {action}."));
        }
        let Some(def) = action::lookup(action) else {
            return Outcome::Rejected(format!("Nothing happens when you try to {action}."));
        };
        let actor_name = self.entity_name(actor).unwrap_or_default();

        if def.name == FLEE {
            return self.flee(actor, room_id);
        }

        if !def.needs_target {
            return Outcome::Acted {
                room: room_id,
                events: vec![ActionEvent::Performed {
                    actor,
                    actor_name,
                    verb: def.verb,
                }],
            };
        }

        let Some(target) = target else {
            return Outcome::Rejected(format!("{} what?", capitalize(action)));
        };
        if target == actor {
            return Outcome::Rejected(format!("You can't {action} yourself."));
        }
        let in_room = self.graph.room(room_id).is_some_and(|r| r.contains(target));
        let Some(target_name) = self.entity_name(target).filter(|_| in_room) else {
            return Outcome::Rejected("That target is not here.".into());
        };

        let remaining = self.damage(target, def.damage);
        let mut events = vec![ActionEvent::Damaged {
            actor,
            actor_name: actor_name.clone(),
            target,
            target_name: target_name.clone(),
            verb: def.verb,
            amount: def.damage,
            remaining,
        }];
        if remaining == 0 {
            let victim_was_player = self.kill(target, room_id, &target_name);
            events.push(ActionEvent::Killed {
                victim: target,
                victim_name: target_name,
                killer_name: actor_name,
                victim_was_player,
            });
            if !victim_was_player {
                if let Some(level) = self
                    .players
                    .get_mut(&actor)
                    .and_then(|p| p.gain_experience(XP_PER_KILL))
                {
                    events.push(ActionEvent::LevelUp {
                        player: actor,
                        level,
                    });
                }
            }
        }
        Outcome::Acted {
            room: room_id,
            events,
        }
    }

    fn flee(&mut self, actor: EntityId, room_id: RoomId) -> Outcome {
        let exits = self.walkable_exits(room_id);
        let Some(direction) = exits.choose(&mut rand::rng()).copied() else {
            return Outcome::Rejected("There is nowhere to flee.".into());
        };
        match self.move_entity(actor, direction.as_str()) {
            Some((from, to, direction)) => Outcome::Moved {
                from,
                to,
                direction,
                fled: true,
            },
            None => Outcome::Rejected("There is nowhere to flee.".into()),
        }
    }

    /// Applies damage and returns the target's remaining health.
    fn damage(&mut self, target: EntityId, amount: u32) -> u32 {
        if let Some(player) = self.players.get_mut(&target) {
            player.take_damage(amount)
        } else if let Some(mob) = self.mobs.get_mut(&target) {
            mob.take_damage(amount)
        } else {
            0
        }
    }

    /// Removes a dead entity from its room. A player stays registered in
    /// the dead state; a mob is gone. Returns whether the victim was a
    /// player.
    fn kill(&mut self, victim: EntityId, room_id: RoomId, name: &str) -> bool {
        self.leave_room(room_id, victim, name);
        if let Some(player) = self.players.get_mut(&victim) {
            player.die();
            tracing::info!(player_id = %victim, %room_id, "player died");
            true
        } else {
            self.mobs.remove(&victim);
            tracing::debug!(mob_id = %victim, %room_id, "mob died");
            false
        }
    }

    // -----------------------------------------------------------------------
    // Outcome -> protocol
    // -----------------------------------------------------------------------

    fn publish(&mut self, actor: EntityId, outcome: Outcome) {
        let is_player = self.players.contains_key(&actor);
        match outcome {
            Outcome::Idle => {}
            Outcome::Moved {
                to,
                direction,
                fled,
                ..
            } => {
                if is_player {
                    let place = self
                        .graph
                        .room(to)
                        .map(|r| r.kind().description())
                        .unwrap_or("somewhere");
                    let verb = if fled { "flee" } else { "move" };
                    self.emit(
                        Recipient::Player(actor),
                        ServerMessage::update(format!("You {verb} {direction} into {place}.")),
                    );
                    self.send_room_info(actor, to);
                }
            }
            Outcome::Blocked { direction } => {
                if is_player {
                    let response = match direction.parse::<Direction>() {
                        Ok(_) => format!("You can't go {direction} from here."),
                        Err(_) => format!("{direction:?} is not a direction."),
                    };
                    self.emit(
                        Recipient::Player(actor),
                        ServerMessage::action_response(response),
                    );
                }
            }
            Outcome::Acted { room, events } => {
                for event in events {
                    self.publish_action_event(room, event);
                }
            }
            Outcome::Chatted { message } => {
                let player_name = self.entity_name(actor).unwrap_or_default();
                self.emit(
                    Recipient::All,
                    ServerMessage::Chat {
                        player_name,
                        chat_message: message,
                    },
                );
            }
            Outcome::Rejected(reason) => {
                if is_player {
                    self.emit(
                        Recipient::Player(actor),
                        ServerMessage::action_response(reason),
                    );
                } else {
                    tracing::debug!(mob_id = %actor, %reason, "mob command rejected");
                }
            }
        }
    }

    fn publish_action_event(&mut self, room: RoomId, event: ActionEvent) {
        match event {
            ActionEvent::Performed {
                actor,
                actor_name,
                verb,
            } => {
                let audience = self.audience_with(room, &[actor]);
                self.emit(
                    Recipient::Players(audience),
                    ServerMessage::update(format!("{actor_name} {verb}.")),
                );
            }
            ActionEvent::Damaged {
                actor,
                actor_name,
                target,
                target_name,
                verb,
                amount,
                remaining,
            } => {
                let audience = self.audience_with(room, &[actor, target]);
                self.emit(
                    Recipient::Players(audience),
                    ServerMessage::update(format!(
                        "{actor_name} {verb} {target_name} for {amount} damage ({remaining} left)."
                    )),
                );
            }
            ActionEvent::Killed {
                victim,
                victim_name,
                killer_name,
                victim_was_player,
            } => {
                let audience = self.audience_with(room, &[victim]);
                self.emit(
                    Recipient::Players(audience),
                    ServerMessage::update(format!("{victim_name} was killed by {killer_name}.")),
                );
                if victim_was_player {
                    self.emit(Recipient::Player(victim), ServerMessage::Death);
                }
            }
            ActionEvent::LevelUp { player, level } => {
                self.emit(
                    Recipient::Player(player),
                    ServerMessage::update(format!("You reached level {level}.")),
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn emit(&self, recipient: Recipient, message: ServerMessage) {
        let event = OutboundEvent {
            tick: self.tick,
            recipient,
            message,
        };
        if self.out.send(event).is_err() {
            tracing::debug!(tick = self.tick, "outbound queue closed, event dropped");
        }
    }

    /// Sends `player` the list of other entities already in `room`.
    fn send_room_info(&self, player: EntityId, room_id: RoomId) {
        let Some(room) = self.graph.room(room_id) else {
            return;
        };
        let entities = room
            .occupants()
            .iter()
            .filter(|id| **id != player)
            .filter_map(|id| {
                Some(RoomChange {
                    room_uid: room_id,
                    entity_uid: *id,
                    entity_name: self.entity_name(*id)?,
                    enters: true,
                })
            })
            .collect();
        self.emit(Recipient::Player(player), ServerMessage::RoomInfo { entities });
    }

    /// Living players currently in `room`.
    fn audience(&self, room_id: RoomId) -> Vec<EntityId> {
        self.graph
            .room(room_id)
            .map(|room| {
                room.occupants()
                    .iter()
                    .copied()
                    .filter(|id| self.players.contains_key(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// [`audience`](Self::audience) plus any of `involved` that are
    /// players but no longer in the room (a victim that just died).
    fn audience_with(&self, room_id: RoomId, involved: &[EntityId]) -> Vec<EntityId> {
        let mut audience = self.audience(room_id);
        for id in involved {
            if self.players.contains_key(id) && !audience.contains(id) {
                audience.push(*id);
            }
        }
        audience
    }

    fn walkable_room_at(&self, x: i32, y: i32) -> Option<RoomId> {
        self.graph
            .room_at(x, y)
            .filter(|room| room.walkable())
            .map(Room::id)
    }

    fn walkable_exits(&self, room_id: RoomId) -> Vec<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|d| {
                self.graph
                    .link(room_id, *d)
                    .and_then(|to| self.graph.room(to))
                    .is_some_and(Room::walkable)
            })
            .collect()
    }

    fn entity_room(&self, id: EntityId) -> Option<RoomId> {
        match self.players.get(&id) {
            Some(player) => player.room(),
            None => self.mobs.get(&id)?.room(),
        }
    }

    fn entity_name(&self, id: EntityId) -> Option<String> {
        match self.players.get(&id) {
            Some(player) => Some(player.name().to_owned()),
            None => self.mobs.get(&id).map(|m| m.name().to_owned()),
        }
    }

    fn entity_can(&self, id: EntityId, action: &str) -> bool {
        match self.players.get(&id) {
            Some(player) => player.can(action),
            None => self.mobs.get(&id).is_some_and(|m| m.can(action)),
        }
    }

    fn enter_room(&mut self, room_id: RoomId, id: EntityId, name: &str) {
        if let Some(room) = self.graph.room_mut(room_id) {
            room.enter(id, name);
        }
    }

    fn leave_room(&mut self, room_id: RoomId, id: EntityId, name: &str) {
        if let Some(room) = self.graph.room_mut(room_id) {
            room.leave(id, name);
        }
    }

    /// Checks that room membership and entity locations agree: every
    /// occupant is a registered entity that says it is in that room, and
    /// every living player and every mob is in exactly the room it names.
    /// Dead players are in no room.
    pub fn is_consistent(&self) -> bool {
        let occupants_ok = self.graph.rooms().all(|room| {
            room.occupants()
                .iter()
                .all(|id| self.entity_room(*id) == Some(room.id()))
        });
        let membership = |id: EntityId, room: Option<RoomId>| {
            let holding: Vec<RoomId> = self
                .graph
                .rooms()
                .filter(|r| r.contains(id))
                .map(Room::id)
                .collect();
            match room {
                Some(room) => holding == [room],
                None => holding.is_empty(),
            }
        };
        let players_ok = self.players.values().all(|p| {
            p.is_alive() == p.room().is_some() && membership(p.id(), p.room())
        });
        let mobs_ok = self
            .mobs
            .values()
            .all(|m| m.room().is_some() && membership(m.id(), m.room()));
        occupants_ok && players_ok && mobs_ok
    }
}

/// Milliseconds in `d`, saturating at `u64::MAX`.
fn whole_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_millis_saturates() {
        assert_eq!(whole_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("bite"), "Bite");
        assert_eq!(capitalize(""), "");
    }
}
