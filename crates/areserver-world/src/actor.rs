//! Players and the actor state they carry.

use areserver_protocol::{PlayerId, Record};

/// Name every player starts with until it sends `NAME`.
pub const DEFAULT_NAME: &str = "Cactus Fantastico";

/// Life every player starts with.
pub const DEFAULT_LIFE: i32 = 100;

/// The mutable, replicated state of one player.
///
/// Nothing here is validated: positions are unbounded, life has no range,
/// and any string is a valid name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub name: String,
    pub life: i32,
}

impl Default for Actor {
    /// A fresh actor has not been placed yet; its position reads as
    /// `i32::MIN` on every axis until the first `POS`.
    fn default() -> Self {
        Self {
            x: i32::MIN,
            y: i32::MIN,
            z: i32::MIN,
            name: DEFAULT_NAME.to_string(),
            life: DEFAULT_LIFE,
        }
    }
}

/// An active player: an [`Actor`] plus the uid it is known by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    uid: PlayerId,
    actor: Actor,
}

impl Player {
    /// Creates a player with default actor fields.
    pub fn new(uid: PlayerId) -> Self {
        Self {
            uid,
            actor: Actor::default(),
        }
    }

    /// The uid this player is known by on the wire.
    pub fn uid(&self) -> PlayerId {
        self.uid
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Moves the actor. Coordinates are stored as sent, even outside the
    /// map.
    pub fn apply_position(&mut self, x: i32, y: i32, z: i32) {
        self.actor.x = x;
        self.actor.y = y;
        self.actor.z = z;
    }

    /// Sets life as sent. Negative and oversized values are kept.
    pub fn apply_life(&mut self, hp: i32) {
        self.actor.life = hp;
    }

    /// Renames the actor. Any string is accepted, the empty one included.
    pub fn apply_name(&mut self, name: impl Into<String>) {
        self.actor.name = name.into();
    }

    /// The records that introduce this player to a newcomer:
    /// `JOIN`, `NAME`, `LIFE`.
    ///
    /// Position is not part of the introduction; clients learn it from the
    /// next `POS` the player sends.
    pub fn introduction(&self) -> [Record; 3] {
        [
            Record::Join { uid: self.uid },
            Record::Name {
                uid: self.uid,
                name: self.actor.name.clone(),
            },
            Record::Life {
                uid: self.uid,
                hp: self.actor.life,
            },
        ]
    }
}
