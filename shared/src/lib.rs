use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod frame;
pub mod view;

pub use frame::{FrameError, FrameReader, FrameWriter};

pub const WORLD_WIDTH: i32 = 800;
pub const WORLD_HEIGHT: i32 = 600;
pub const PLAYER_SIZE: i32 = 40;
pub const ITEM_SIZE: i32 = 20;

/// Largest coordinate a player's anchor may take on either axis.
pub const MAX_X: i32 = WORLD_WIDTH - PLAYER_SIZE;
pub const MAX_Y: i32 = WORLD_HEIGHT - PLAYER_SIZE;

/// Spawn area shared by players and items, inclusive on both ends.
pub const SPAWN_MIN_X: i32 = 50;
pub const SPAWN_MAX_X: i32 = 750;
pub const SPAWN_MIN_Y: i32 = 50;
pub const SPAWN_MAX_Y: i32 = 550;

pub const DEFAULT_ITEM_COUNT: usize = 10;

/// Payload limit for frames sent by clients.
pub const MAX_CLIENT_FRAME: usize = 1024;

pub type SessionId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Builds a position from untrusted coordinates, clamped into the world.
    pub fn clamped(x: i64, y: i64) -> Self {
        Self {
            x: x.clamp(0, MAX_X as i64) as i32,
            y: y.clamp(0, MAX_Y as i64) as i32,
        }
    }

    pub fn in_bounds(&self) -> bool {
        (0..=MAX_X).contains(&self.x) && (0..=MAX_Y).contains(&self.y)
    }
}

/// Axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn player(pos: Position) -> Self {
        Self::new(pos.x, pos.y, PLAYER_SIZE, PLAYER_SIZE)
    }

    pub fn item(item: &Item) -> Self {
        Self::new(item.x, item.y, ITEM_SIZE, ITEM_SIZE)
    }

    /// Strict overlap test: boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// A collectible ball.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub x: i32,
    pub y: i32,
    pub color: [u8; 3],
}

/// Sent once, right after a connection is accepted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub player_id: SessionId,
    pub position: Position,
    pub balls: Vec<Item>,
}

/// Full world state, sent to every session after each accepted move.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct StateUpdate {
    pub players: BTreeMap<SessionId, Position>,
    pub balls: Vec<Item>,
    pub scores: BTreeMap<SessionId, u32>,
}

/// Keepalive probe for idle sessions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub ping: bool,
}

impl Default for Ping {
    fn default() -> Self {
        Self { ping: true }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServerMessage {
    Welcome(Welcome),
    State(StateUpdate),
    Ping(Ping),
}

impl ServerMessage {
    pub fn ping() -> Self {
        ServerMessage::Ping(Ping::default())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a server message, picking the shape by which keys are present.
    ///
    /// The shapes carry no tag on the wire, so the object is inspected first and
    /// then decoded into the matching struct. A state update must carry all of
    /// `players`, `balls` and `scores`.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        let probe: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(data)?;

        if probe.contains_key("ping") {
            Ok(ServerMessage::Ping(serde_json::from_slice(data)?))
        } else if probe.contains_key("player_id") {
            Ok(ServerMessage::Welcome(serde_json::from_slice(data)?))
        } else {
            Ok(ServerMessage::State(serde_json::from_slice(data)?))
        }
    }
}

/// Absolute position reported by a client.
///
/// Coordinates are accepted as any integer and clamped by the server, so a
/// client overshooting the world edge still moves instead of being dropped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub x: i64,
    pub y: i64,
}

impl PositionUpdate {
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn clamped(&self) -> Position {
        Position::clamped(self.x, self.y)
    }
}
