//! Map grids: tiles, left-edge walls and top-edge walls.
//!
//! A map of `width × height × depth` cells carries three grids:
//!
//! ```text
//! tiles       width     × height     × depth
//! left walls  (width+1) × height     × depth   (x == width closes the east side)
//! top walls   width     × (height+1) × depth   (y == height closes the south side)
//! ```
//!
//! Grids are fixed in shape once built. Cells start empty and, once set,
//! may be overwritten but never cleared.

use serde::{Deserialize, Serialize};

use areserver_protocol::Record;

use crate::WorldError;

/// Largest accepted value for any map dimension.
///
/// Keeps every coordinate representable as the `i32` the wire uses.
pub const MAX_DIMENSION: usize = 1024;

/// Largest accepted `width × height × depth`.
///
/// Each axis may reach [`MAX_DIMENSION`], but not all three at once: the
/// three grids are allocated up front, and a full 1024³ map would not fit
/// in memory.
pub const MAX_CELLS: usize = 1 << 22;

// ---------------------------------------------------------------------------
// MapConfig
// ---------------------------------------------------------------------------

/// Dimensions of the world map, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            depth: 3,
        }
    }
}

impl MapConfig {
    /// Total number of tile cells, or `None` on overflow.
    pub fn cell_count(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.depth)
    }

    fn validate(&self) -> Result<(), WorldError> {
        let ok = |d: usize| (1..=MAX_DIMENSION).contains(&d);
        let fits = self.cell_count().is_some_and(|cells| cells <= MAX_CELLS);
        if ok(self.width) && ok(self.height) && ok(self.depth) && fits {
            Ok(())
        } else {
            Err(WorldError::InvalidDimensions {
                width: self.width,
                height: self.height,
                depth: self.depth,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Grid3
// ---------------------------------------------------------------------------

/// A fixed-shape 3D grid of optional cells.
///
/// Stored z-major, so walking the backing vector visits cells in ascending
/// `(z, y, x)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid3<T> {
    width: usize,
    height: usize,
    depth: usize,
    cells: Vec<Option<T>>,
}

impl<T> Grid3<T> {
    /// Creates an empty grid.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        let mut cells = Vec::new();
        cells.resize_with(width * height * depth, || None);
        Self {
            width,
            height,
            depth,
            cells,
        }
    }

    /// `(width, height, depth)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        (x < self.width && y < self.height && z < self.depth)
            .then(|| (z * self.height + y) * self.width + x)
    }

    /// The cell at `(x, y, z)`. `None` if it is empty or out of range.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        self.index(x, y, z).and_then(|i| self.cells[i].as_ref())
    }

    /// Occupies a cell, replacing whatever was there.
    ///
    /// Returns `false` (and changes nothing) if the coordinates fall
    /// outside the grid.
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> bool {
        match self.index(x, y, z) {
            Some(i) => {
                self.cells[i] = Some(value);
                true
            }
            None => false,
        }
    }

    /// Occupied cells in ascending `(z, y, x)` order.
    pub fn occupied(&self) -> impl Iterator<Item = ((usize, usize, usize), &T)> + '_ {
        let (w, h) = (self.width, self.height);
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.as_ref().map(|v| ((i % w, (i / w) % h, i / (w * h)), v))
        })
    }

    /// Number of non-empty cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Tiles and walls
// ---------------------------------------------------------------------------

/// One occupied floor cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub tile_id: i32,
}

/// One occupied wall edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wall {
    pub wall_id: i32,
    /// Whether actors can walk through it. Server-side only; the wire
    /// carries just the id.
    pub passable: bool,
}

/// Tile materials the default layout uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Wood,
}

impl TileKind {
    pub fn id(self) -> i32 {
        match self {
            TileKind::Wood => 1,
        }
    }

    /// A tile of this kind.
    pub fn tile(self) -> Tile {
        Tile { tile_id: self.id() }
    }
}

/// Wall materials the default layout uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallKind {
    RedBrick,
    WoodenDoor,
}

impl WallKind {
    pub fn id(self) -> i32 {
        match self {
            WallKind::RedBrick => 1,
            WallKind::WoodenDoor => 2,
        }
    }

    /// A wall of this kind, with its passability filled in.
    pub fn wall(self) -> Wall {
        Wall {
            wall_id: self.id(),
            passable: matches!(self, WallKind::WoodenDoor),
        }
    }
}

// ---------------------------------------------------------------------------
// WorldMap
// ---------------------------------------------------------------------------

/// The static part of the world: one tile grid and two wall grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMap {
    config: MapConfig,
    tiles: Grid3<Tile>,
    left_walls: Grid3<Wall>,
    top_walls: Grid3<Wall>,
}

impl WorldMap {
    /// Creates a map with every grid empty.
    ///
    /// # Errors
    /// [`WorldError::InvalidDimensions`] if any dimension is zero or larger
    /// than [`MAX_DIMENSION`], or the map has more than [`MAX_CELLS`] cells.
    pub fn empty(config: MapConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let MapConfig {
            width: w,
            height: h,
            depth: d,
        } = config;
        Ok(Self {
            config,
            tiles: Grid3::new(w, h, d),
            left_walls: Grid3::new(w + 1, h, d),
            top_walls: Grid3::new(w, h + 1, d),
        })
    }

    /// Builds the stock map: a wooden floor everywhere, a red-brick
    /// perimeter on every level, two small wall fragments and a door.
    ///
    /// Features that fall outside a smaller map are skipped.
    pub fn default_layout(config: MapConfig) -> Result<Self, WorldError> {
        let mut map = Self::empty(config)?;
        let MapConfig {
            width: w,
            height: h,
            depth: d,
        } = config;
        let brick = WallKind::RedBrick.wall();

        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    map.tiles.set(x, y, z, TileKind::Wood.tile());
                }
                map.left_walls.set(0, y, z, brick);
                map.left_walls.set(w, y, z, brick);
            }
            for x in 0..w {
                map.top_walls.set(x, 0, z, brick);
                map.top_walls.set(x, h, z, brick);
            }
        }

        for (x, y, z) in [(10, 10, 0), (5, 5, 2)] {
            map.top_walls.set(x, y, z, brick);
            map.top_walls.set(x, y + 1, z, brick);
            map.left_walls.set(x, y, z, brick);
        }

        map.left_walls.set(0, 1, 0, WallKind::WoodenDoor.wall());

        tracing::debug!(
            width = w,
            height = h,
            depth = d,
            tiles = map.tiles.occupied_count(),
            left_walls = map.left_walls.occupied_count(),
            top_walls = map.top_walls.occupied_count(),
            "default map built"
        );
        Ok(map)
    }

    /// The dimensions this map was built with.
    pub fn config(&self) -> MapConfig {
        self.config
    }

    pub fn tiles(&self) -> &Grid3<Tile> {
        &self.tiles
    }

    /// Walls on the west edge of each cell, one column wider than the map.
    pub fn left_walls(&self) -> &Grid3<Wall> {
        &self.left_walls
    }

    /// Walls on the north edge of each cell, one row taller than the map.
    pub fn top_walls(&self) -> &Grid3<Wall> {
        &self.top_walls
    }

    /// Places a tile. Returns `false`, changing nothing, when out of range.
    /// The same holds for the two wall setters below.
    pub fn set_tile(&mut self, x: usize, y: usize, z: usize, tile: Tile) -> bool {
        self.tiles.set(x, y, z, tile)
    }

    pub fn set_left_wall(&mut self, x: usize, y: usize, z: usize, wall: Wall) -> bool {
        self.left_walls.set(x, y, z, wall)
    }

    pub fn set_top_wall(&mut self, x: usize, y: usize, z: usize, wall: Wall) -> bool {
        self.top_walls.set(x, y, z, wall)
    }

    /// Every occupied cell as a record: tiles, then left-edge walls, then
    /// top-edge walls, each in ascending `(z, y, x)` order.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        let tiles = self.tiles.occupied().map(|((x, y, z), tile)| Record::Tile {
            x: coord(x),
            y: coord(y),
            z: coord(z),
            tile_id: tile.tile_id,
        });
        let left = self
            .left_walls
            .occupied()
            .map(|(pos, wall)| wall_record(pos, wall, true));
        let top = self
            .top_walls
            .occupied()
            .map(|(pos, wall)| wall_record(pos, wall, false));
        tiles.chain(left).chain(top)
    }

    /// Number of records [`WorldMap::records`] yields.
    pub fn record_count(&self) -> usize {
        self.tiles.occupied_count()
            + self.left_walls.occupied_count()
            + self.top_walls.occupied_count()
    }
}

// Dimensions are capped at MAX_DIMENSION, so every index fits.
fn coord(v: usize) -> i32 {
    v as i32
}

fn wall_record((x, y, z): (usize, usize, usize), wall: &Wall, is_left_edge: bool) -> Record {
    Record::Wall {
        x: coord(x),
        y: coord(y),
        z: coord(z),
        wall_id: wall.wall_id,
        is_left_edge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_set_out_of_range_is_rejected() {
        let mut grid = Grid3::new(2, 2, 1);
        assert!(!grid.set(2, 0, 0, 1));
        assert!(!grid.set(0, 0, 1, 1));
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_grid_occupied_walks_z_then_y_then_x() {
        let mut grid = Grid3::new(3, 2, 2);
        grid.set(0, 0, 1, 'd');
        grid.set(2, 0, 0, 'b');
        grid.set(0, 1, 0, 'c');
        grid.set(1, 0, 0, 'a');

        let order: Vec<_> = grid.occupied().map(|(pos, v)| (pos, *v)).collect();
        assert_eq!(
            order,
            vec![
                ((1, 0, 0), 'a'),
                ((2, 0, 0), 'b'),
                ((0, 1, 0), 'c'),
                ((0, 0, 1), 'd'),
            ]
        );
    }

    #[test]
    fn test_grid_set_overwrites() {
        let mut grid = Grid3::new(1, 1, 1);
        grid.set(0, 0, 0, 1);
        grid.set(0, 0, 0, 2);
        assert_eq!(grid.get(0, 0, 0), Some(&2));
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn test_empty_map_has_edge_grids_one_larger() {
        let map = WorldMap::empty(MapConfig::default()).unwrap();
        assert_eq!(map.tiles().dims(), (20, 20, 3));
        assert_eq!(map.left_walls().dims(), (21, 20, 3));
        assert_eq!(map.top_walls().dims(), (20, 21, 3));
        assert_eq!(map.record_count(), 0);
    }

    #[test]
    fn test_zero_dimension_is_invalid() {
        let config = MapConfig {
            width: 0,
            ..MapConfig::default()
        };
        assert!(matches!(
            WorldMap::empty(config),
            Err(WorldError::InvalidDimensions { width: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_dimension_is_invalid() {
        let config = MapConfig {
            depth: MAX_DIMENSION + 1,
            ..MapConfig::default()
        };
        assert!(WorldMap::empty(config).is_err());
    }

    #[test]
    fn test_too_many_cells_is_invalid() {
        let config = MapConfig {
            width: MAX_DIMENSION,
            height: MAX_DIMENSION,
            depth: MAX_DIMENSION,
        };
        assert!(matches!(
            WorldMap::empty(config),
            Err(WorldError::InvalidDimensions { depth: MAX_DIMENSION, .. })
        ));
    }

    #[test]
    fn test_largest_allowed_map_is_valid() {
        let config = MapConfig {
            width: MAX_DIMENSION,
            height: MAX_DIMENSION,
            depth: MAX_CELLS / (MAX_DIMENSION * MAX_DIMENSION),
        };
        assert_eq!(config.cell_count(), Some(MAX_CELLS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_layout_counts() {
        let map = WorldMap::default_layout(MapConfig::default()).unwrap();
        assert_eq!(map.tiles().occupied_count(), 1200);
        // Perimeter 2*20*3 plus one fragment per square.
        assert_eq!(map.left_walls().occupied_count(), 122);
        // Perimeter 2*20*3 plus two fragments per square.
        assert_eq!(map.top_walls().occupied_count(), 124);
        assert_eq!(map.record_count(), 1446);
    }

    #[test]
    fn test_default_layout_door_is_passable() {
        let map = WorldMap::default_layout(MapConfig::default()).unwrap();
        let door = map.left_walls().get(0, 1, 0).unwrap();
        assert_eq!(door.wall_id, WallKind::WoodenDoor.id());
        assert!(door.passable);

        let brick = map.left_walls().get(0, 2, 0).unwrap();
        assert_eq!(brick.wall_id, WallKind::RedBrick.id());
        assert!(!brick.passable);
    }

    #[test]
    fn test_default_layout_small_map_skips_out_of_range_features() {
        let config = MapConfig {
            width: 4,
            height: 4,
            depth: 1,
        };
        let map = WorldMap::default_layout(config).unwrap();
        assert_eq!(map.tiles().occupied_count(), 16);
        assert_eq!(map.left_walls().occupied_count(), 8);
        assert_eq!(map.top_walls().occupied_count(), 8);
    }

    #[test]
    fn test_records_emit_tiles_then_left_then_top() {
        let mut map = WorldMap::empty(MapConfig {
            width: 2,
            height: 2,
            depth: 1,
        })
        .unwrap();
        map.set_top_wall(0, 0, 0, WallKind::RedBrick.wall());
        map.set_left_wall(2, 1, 0, WallKind::WoodenDoor.wall());
        map.set_tile(1, 1, 0, TileKind::Wood.tile());

        let records: Vec<_> = map.records().collect();
        assert_eq!(
            records,
            vec![
                Record::Tile {
                    x: 1,
                    y: 1,
                    z: 0,
                    tile_id: 1
                },
                Record::Wall {
                    x: 2,
                    y: 1,
                    z: 0,
                    wall_id: 2,
                    is_left_edge: true
                },
                Record::Wall {
                    x: 0,
                    y: 0,
                    z: 0,
                    wall_id: 1,
                    is_left_edge: false
                },
            ]
        );
    }
}
