//! Core protocol types for Areserver's wire format.
//!
//! Every message on the wire is a run of zero or more tagged records. This
//! module defines the records themselves; [`crate::wire`] defines their
//! byte layout and [`crate::codec`] turns whole messages into bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The 64-bit identity of a connected player (the "uid").
///
/// Assigned once per connection from the transport's connection id. It is
/// unique among active players, but the transport may hand the same value
/// to a later connection once the earlier one is gone.
///
/// `#[serde(transparent)]` keeps it a plain number in JSON: `PlayerId(42)`
/// becomes `42`, not `{"0":42}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// The ASCII tag that starts every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Join,
    Part,
    Name,
    Life,
    Pos,
    Chat,
    Tile,
    Wall,
    MultiOn,
    MultiOff,
}

impl Tag {
    /// Every tag, in table order.
    pub const ALL: [Tag; 10] = [
        Tag::Join,
        Tag::Part,
        Tag::Name,
        Tag::Life,
        Tag::Pos,
        Tag::Chat,
        Tag::Tile,
        Tag::Wall,
        Tag::MultiOn,
        Tag::MultiOff,
    ];

    /// The tag exactly as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Join => "JOIN",
            Tag::Part => "PART",
            Tag::Name => "NAME",
            Tag::Life => "LIFE",
            Tag::Pos => "POS",
            Tag::Chat => "CHAT",
            Tag::Tile => "TILE",
            Tag::Wall => "WALL",
            Tag::MultiOn => "MULTI_ON",
            Tag::MultiOff => "MULTI_OFF",
        }
    }

    /// Parses a wire tag.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownTag`] for anything outside the
    /// fixed enumeration. Matching is case-sensitive.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == raw)
            .ok_or_else(|| ProtocolError::UnknownTag(raw.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record: server → client
// ---------------------------------------------------------------------------

/// One record of the full schema, as the server sends it.
///
/// | Tag | Fields |
/// |---|---|
/// | `JOIN` | uid |
/// | `PART` | uid |
/// | `NAME` | uid, name |
/// | `LIFE` | uid, hp |
/// | `POS` | uid, x, y, z |
/// | `CHAT` | uid, text |
/// | `TILE` | x, y, z, tile_id |
/// | `WALL` | x, y, z, wall_id, is_left_edge |
/// | `MULTI_ON` | (none) |
/// | `MULTI_OFF` | (none) |
///
/// `#[serde(tag = "tag")]` produces internally tagged JSON, e.g.
/// `{ "tag": "POS", "uid": 7, "x": 5, "y": 5, "z": 1 }`, so the JSON form
/// reads like the binary one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Record {
    /// A player became active.
    Join { uid: PlayerId },

    /// A player became inactive.
    Part { uid: PlayerId },

    /// A player's display name, current or changed.
    Name { uid: PlayerId, name: String },

    /// A player's life value, current or changed.
    Life { uid: PlayerId, hp: i32 },

    /// A player's position, current or changed.
    Pos {
        uid: PlayerId,
        x: i32,
        y: i32,
        z: i32,
    },

    /// A chat line from a player.
    Chat { uid: PlayerId, text: String },

    /// One occupied map cell.
    Tile { x: i32, y: i32, z: i32, tile_id: i32 },

    /// One occupied wall edge.
    Wall {
        x: i32,
        y: i32,
        z: i32,
        wall_id: i32,
        is_left_edge: bool,
    },

    /// Opens a batch describing full state (onboarding or a new map).
    MultiOn,

    /// Closes the batch opened by [`Record::MultiOn`].
    MultiOff,
}

impl Record {
    /// The wire tag of this record.
    pub fn tag(&self) -> Tag {
        match self {
            Record::Join { .. } => Tag::Join,
            Record::Part { .. } => Tag::Part,
            Record::Name { .. } => Tag::Name,
            Record::Life { .. } => Tag::Life,
            Record::Pos { .. } => Tag::Pos,
            Record::Chat { .. } => Tag::Chat,
            Record::Tile { .. } => Tag::Tile,
            Record::Wall { .. } => Tag::Wall,
            Record::MultiOn => Tag::MultiOn,
            Record::MultiOff => Tag::MultiOff,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRecord: client → server
// ---------------------------------------------------------------------------

/// A mutation request sent by a client.
///
/// Requests carry no uid: the server knows who sent them from the
/// connection and stamps the sender's uid on the [`Record`] it echoes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientRecord {
    /// Move to a new position. Not bounds-checked against the map.
    Pos { x: i32, y: i32, z: i32 },

    /// Set life to a new value. Not clamped.
    Life { hp: i32 },

    /// Change display name. Empty and duplicate names are allowed.
    Name { name: String },

    /// Say something to everyone.
    Chat { text: String },
}

impl ClientRecord {
    /// The wire tag of this request.
    pub fn tag(&self) -> Tag {
        match self {
            ClientRecord::Pos { .. } => Tag::Pos,
            ClientRecord::Life { .. } => Tag::Life,
            ClientRecord::Name { .. } => Tag::Name,
            ClientRecord::Chat { .. } => Tag::Chat,
        }
    }

    /// Builds the outbound echo of this request on behalf of `uid`.
    pub fn echo(&self, uid: PlayerId) -> Record {
        match self.clone() {
            ClientRecord::Pos { x, y, z } => Record::Pos { uid, x, y, z },
            ClientRecord::Life { hp } => Record::Life { uid, hp },
            ClientRecord::Name { name } => Record::Name { uid, name },
            ClientRecord::Chat { text } => Record::Chat { uid, text },
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
