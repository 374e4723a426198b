//! The room graph: static topology built from map records.
//!
//! Rooms are created once at startup and never destroyed. Neighbor links
//! are not authored; they are derived from grid coordinates, so two rooms
//! at adjacent coordinates always link both ways. A malformed map (holes,
//! duplicated coordinates) silently yields missing or one-way links.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use burrow_protocol::{EntityId, RoomChange, RoomId};
use serde::{Deserialize, Serialize};

use crate::WorldError;

const DEFAULT_MAP: &str = include_str!("../maps/default.json");

// ---------------------------------------------------------------------------
// RoomKind
// ---------------------------------------------------------------------------

/// Room archetypes. The set is closed; each kind fixes whether entities
/// may stand in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    RoughSide,
    Wall,
    LeftLower,
    RightLower,
    RightTop,
    LeftTop,
    SpidersDen,
    TopOfLeaf,
}

impl RoomKind {
    pub const ALL: [RoomKind; 8] = [
        Self::RoughSide,
        Self::Wall,
        Self::LeftLower,
        Self::RightLower,
        Self::RightTop,
        Self::LeftTop,
        Self::SpidersDen,
        Self::TopOfLeaf,
    ];

    /// The short code used in map files.
    pub fn code(self) -> &'static str {
        match self {
            Self::RoughSide => "rs",
            Self::Wall => "wall",
            Self::LeftLower => "ll",
            Self::RightLower => "rl",
            Self::RightTop => "rt",
            Self::LeftTop => "lt",
            Self::SpidersDen => "sd",
            Self::TopOfLeaf => "tol",
        }
    }

    /// The long name, accepted as an alias of [`code`](Self::code).
    pub fn long_name(self) -> &'static str {
        match self {
            Self::RoughSide => "rough-side",
            Self::Wall => "wall",
            Self::LeftLower => "left-lower",
            Self::RightLower => "right-lower",
            Self::RightTop => "right-top",
            Self::LeftTop => "left-top",
            Self::SpidersDen => "spiders-den",
            Self::TopOfLeaf => "top-of-leaf",
        }
    }

    pub fn walkable(self) -> bool {
        !matches!(self, Self::Wall)
    }

    /// Narration used when a player walks in.
    pub fn description(self) -> &'static str {
        match self {
            Self::RoughSide => "the rough side of the leaf",
            Self::Wall => "a wall",
            Self::LeftLower => "the lower left edge of the leaf",
            Self::RightLower => "the lower right edge of the leaf",
            Self::RightTop => "the upper right edge of the leaf",
            Self::LeftTop => "the upper left edge of the leaf",
            Self::SpidersDen => "a spider's den",
            Self::TopOfLeaf => "the top of the leaf",
        }
    }
}

impl FromStr for RoomKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == s || kind.long_name() == s)
            .ok_or(())
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// MapRecord
// ---------------------------------------------------------------------------

/// One entry of map data: `{"type": "rs", "x": 1, "y": 2}`.
///
/// `kind` stays a string until [`RoomGraph::build`] so that an unknown
/// archetype is reported with its coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: i32,
    pub y: i32,
}

impl MapRecord {
    pub fn new(kind: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: kind.into(),
            x,
            y,
        }
    }

    /// Parses a JSON list of records.
    pub fn parse_list(json: &str) -> Result<Vec<Self>, WorldError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The map bundled with the crate: a leaf ringed by walls.
    pub fn default_map() -> Result<Vec<Self>, WorldError> {
        Self::parse_list(DEFAULT_MAP)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A cardinal direction. North is towards smaller `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Coordinate delta from a room to its neighbor in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Returned when a string is not one of the four cardinal directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDirection(pub String);

impl FromStr for Direction {
    type Err = InvalidDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| InvalidDirection(s.to_owned()))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A node of the world graph.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    kind: RoomKind,
    x: i32,
    y: i32,
    links: [Option<RoomId>; 4],
    occupants: BTreeSet<EntityId>,
    /// Entries and exits since the last drain.
    events: Vec<RoomChange>,
}

impl Room {
    fn new(id: RoomId, kind: RoomKind, x: i32, y: i32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            links: [None; 4],
            occupants: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn walkable(&self) -> bool {
        self.kind.walkable()
    }

    pub fn link(&self, direction: Direction) -> Option<RoomId> {
        self.links[direction.index()]
    }

    /// Entities currently in the room, players and mobs alike.
    pub fn occupants(&self) -> &BTreeSet<EntityId> {
        &self.occupants
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.occupants.contains(&entity)
    }

    /// Room changes buffered since the last tick drained this room.
    pub fn pending_events(&self) -> &[RoomChange] {
        &self.events
    }

    pub(crate) fn enter(&mut self, entity: EntityId, name: &str) {
        self.occupants.insert(entity);
        self.record(entity, name, true);
    }

    pub(crate) fn leave(&mut self, entity: EntityId, name: &str) {
        if self.occupants.remove(&entity) {
            self.record(entity, name, false);
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<RoomChange> {
        std::mem::take(&mut self.events)
    }

    fn record(&mut self, entity: EntityId, name: &str, enters: bool) {
        self.events.push(RoomChange {
            room_uid: self.id,
            entity_uid: entity,
            entity_name: name.to_owned(),
            enters,
        });
    }
}

// ---------------------------------------------------------------------------
// RoomGraph
// ---------------------------------------------------------------------------

/// All rooms of the world, keyed by id in map-record order.
#[derive(Debug, Clone, Default)]
pub struct RoomGraph {
    rooms: BTreeMap<RoomId, Room>,
}

impl RoomGraph {
    /// Builds the graph from map records.
    ///
    /// Rooms get ids `1..=n` in record order. Linking scans every other
    /// room for each room, which is quadratic in the room count; maps are
    /// dozens to a few hundred rooms.
    ///
    /// When two records share a coordinate the earlier one wins, both for
    /// [`room_at`](Self::room_at) and as a link target.
    ///
    /// # Errors
    /// [`WorldError::UnknownRoomKind`] if any record's type is outside
    /// [`RoomKind`]. No partial graph is returned.
    pub fn build(records: &[MapRecord]) -> Result<Self, WorldError> {
        let mut rooms = BTreeMap::new();
        let mut seen = HashSet::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let kind: RoomKind =
                record
                    .kind
                    .parse()
                    .map_err(|()| WorldError::UnknownRoomKind {
                        kind: record.kind.clone(),
                        x: record.x,
                        y: record.y,
                    })?;
            if !seen.insert((record.x, record.y)) {
                tracing::warn!(
                    x = record.x,
                    y = record.y,
                    "duplicate map coordinate, later room is unreachable by position"
                );
            }
            let id = RoomId(index as u64 + 1);
            rooms.insert(id, Room::new(id, kind, record.x, record.y));
        }

        let positions: Vec<(RoomId, (i32, i32))> =
            rooms.values().map(|r| (r.id, r.position())).collect();

        for room in rooms.values_mut() {
            for direction in Direction::ALL {
                let (dx, dy) = direction.offset();
                let wanted = (room.x + dx, room.y + dy);
                room.links[direction.index()] = positions
                    .iter()
                    .find(|(id, pos)| *id != room.id && *pos == wanted)
                    .map(|(id, _)| *id);
            }
        }

        tracing::info!(rooms = rooms.len(), "room graph built");
        Ok(Self { rooms })
    }

    /// The room at `(x, y)`, if any. Linear scan; meant for setup and spawn.
    pub fn room_at(&self, x: i32, y: i32) -> Option<&Room> {
        self.rooms.values().find(|r| r.position() == (x, y))
    }

    /// The neighbor of `room` in `direction`, or `None` for no link.
    pub fn link(&self, room: RoomId, direction: Direction) -> Option<RoomId> {
        self.rooms.get(&room).and_then(|r| r.link(direction))
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub(crate) fn room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub(crate) fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
