//! World state for Areserver.
//!
//! Holds the single canonical copy of the world: a 3D tile grid, two wall
//! grids (left edges and top edges of every cell) and the live players.
//!
//! # Key types
//!
//! - [`Actor`] / [`Player`]: a player's mutable state and its uid
//! - [`Grid3`]: fixed-shape 3D grid of optional cells
//! - [`WorldMap`]: the tile and wall grids, plus the default layout
//! - [`WorldState`]: map + players, mutations and snapshots
//! - [`MapConfig`]: map dimensions

mod actor;
mod error;
mod map;
mod state;

pub use actor::{Actor, Player, DEFAULT_LIFE, DEFAULT_NAME};
pub use error::WorldError;
pub use map::{Grid3, MapConfig, Tile, TileKind, Wall, WallKind, WorldMap, MAX_CELLS, MAX_DIMENSION};
pub use state::WorldState;
