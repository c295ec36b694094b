//! # Grid & Room Model
//!
//! The addressable 2D tile array and the transient room bookkeeping used
//! during generation.
//!
//! Out-of-bounds reads return a shared sentinel tile (never a panic) so rule
//! evaluation can probe neighbors freely; out-of-bounds writes are an error
//! surfaced through [`UndercroftResult`].

use crate::{UndercroftError, UndercroftResult};
use serde::{Deserialize, Serialize};

/// A 2D coordinate in the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use undercroft::Position;
    ///
    /// let a = Position::new(0, 0);
    /// let b = Position::new(3, 4);
    /// assert_eq!(a.manhattan_distance(b), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Position offset by `steps` tiles in `dir`.
    pub fn step(self, dir: Direction, steps: i32) -> Position {
        let d = dir.to_delta();
        Position::new(self.x + d.x * steps, self.y + d.y * steps)
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Directions for adjacency probes and tile orientation.
///
/// North is negative `y`, matching the row order of [`TileGrid`] and the
/// ASCII rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Direction {
    /// Converts a direction to a position delta.
    pub fn to_delta(self) -> Position {
        match self {
            Direction::North => Position::new(0, -1),
            Direction::South => Position::new(0, 1),
            Direction::East => Position::new(1, 0),
            Direction::West => Position::new(-1, 0),
            Direction::Northeast => Position::new(1, -1),
            Direction::Northwest => Position::new(-1, -1),
            Direction::Southeast => Position::new(1, 1),
            Direction::Southwest => Position::new(-1, 1),
        }
    }

    /// The opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Northeast => Direction::Southwest,
            Direction::Northwest => Direction::Southeast,
            Direction::Southeast => Direction::Northwest,
            Direction::Southwest => Direction::Northeast,
        }
    }

    /// The four cardinal directions.
    pub fn cardinal() -> [Direction; 4] {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
    }

    /// Parses a compact direction token (`n`, `s`, `e`, `w`, `ne`, `nw`,
    /// `se`, `sw`). Returns `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Direction> {
        match token {
            "n" => Some(Direction::North),
            "s" => Some(Direction::South),
            "e" => Some(Direction::East),
            "w" => Some(Direction::West),
            "ne" => Some(Direction::Northeast),
            "nw" => Some(Direction::Northwest),
            "se" => Some(Direction::Southeast),
            "sw" => Some(Direction::Southwest),
            _ => None,
        }
    }
}

/// Corner orientations for wall-corner tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    Northwest,
    Northeast,
    Southwest,
    Southeast,
}

/// Concrete tile types stamped into the grid.
///
/// Orientation payloads replace the flattened directional variants of a
/// plain integer scheme; [`Tile::usage`] collapses them back to the semantic
/// role used for style/object bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Empty cell
    None,
    Floor,
    /// Lower half of a stair pair; the direction is the ascent direction.
    StairBase(Direction),
    /// Upper half of a stair pair; the direction is the ascent direction.
    StairTop(Direction),
    Exit,
    Entrance,
    /// Straight wall on the named edge of its room.
    Wall(Direction),
    /// Inside corner of a room outline.
    WallCorner(Corner),
    /// Outside corner produced when an opening is cut into a wall.
    WallCornerOutside(Corner),
    /// Door frame; the direction points into the room the door opens onto.
    DoorFrame(Direction),
    /// Resolved concrete door (used as a style-lookup probe, never stamped).
    Door,
}

/// The semantic role of a tile, used to bucket applicable styles/objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileUsage {
    None,
    Floor,
    StairBase,
    StairTop,
    Exit,
    Entrance,
    Wall,
    WallCorner,
    WallCornerOutside,
    DoorFrame,
    Door,
}

impl TileUsage {
    /// Parses the usage names used in catalog definitions. Unknown names map
    /// to `None`, mirroring the permissive config contract.
    pub fn from_name(name: &str) -> TileUsage {
        match name {
            "floor" => TileUsage::Floor,
            "wall" => TileUsage::Wall,
            "corner" => TileUsage::WallCorner,
            "corner_outside" => TileUsage::WallCornerOutside,
            "stair_base" => TileUsage::StairBase,
            "stair_top" => TileUsage::StairTop,
            "door" => TileUsage::Door,
            "door_frame" => TileUsage::DoorFrame,
            "exit" => TileUsage::Exit,
            "entrance" => TileUsage::Entrance,
            _ => TileUsage::None,
        }
    }
}

/// A single cell in the map grid.
///
/// Carries the tile type, vertical elevation, connectivity info, and the
/// indices of the room/template/style/object resolved for it during
/// generation. Index fields refer into the owning session's room list and
/// template catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub kind: TileKind,
    pub position: Position,
    /// Vertical elevation of the tile.
    pub z: f32,
    /// Connectivity info; 0 means unassigned.
    pub sector_id: u32,
    /// Used by doors.
    pub locked: bool,
    /// Set internally to prevent objects from spawning on this tile.
    pub block_object_spawn: bool,
    /// Owning room, only valid during generation.
    pub room: Option<usize>,
    pub template: Option<usize>,
    pub style: Option<usize>,
    pub object: Option<usize>,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            kind: TileKind::None,
            position: Position::new(-1, -1),
            z: 0.0,
            sector_id: 0,
            locked: false,
            block_object_spawn: false,
            room: None,
            template: None,
            style: None,
            object: None,
        }
    }
}

impl Tile {
    /// The shared sentinel returned for out-of-bounds reads. Also serves as
    /// the null context for rules that do not depend on tile state.
    pub fn sentinel() -> Tile {
        Tile::default()
    }

    /// The semantic role of this tile.
    pub fn usage(&self) -> TileUsage {
        match self.kind {
            TileKind::None => TileUsage::None,
            TileKind::Floor => TileUsage::Floor,
            TileKind::StairBase(_) => TileUsage::StairBase,
            TileKind::StairTop(_) => TileUsage::StairTop,
            TileKind::Exit => TileUsage::Exit,
            TileKind::Entrance => TileUsage::Entrance,
            TileKind::Wall(_) => TileUsage::Wall,
            TileKind::WallCorner(_) => TileUsage::WallCorner,
            TileKind::WallCornerOutside(_) => TileUsage::WallCornerOutside,
            TileKind::DoorFrame(_) => TileUsage::DoorFrame,
            TileKind::Door => TileUsage::Door,
        }
    }

    /// Whether a walker can stand on this tile (door frames excluded; they
    /// depend on lock state, see [`Tile::is_fill_passable`]).
    pub fn is_traversable(&self) -> bool {
        matches!(
            self.kind,
            TileKind::Floor
                | TileKind::StairBase(_)
                | TileKind::StairTop(_)
                | TileKind::Exit
                | TileKind::Entrance
        )
    }

    /// Whether the sector flood fill may pass through this tile: floor-like,
    /// or an unlocked door frame.
    pub fn is_fill_passable(&self) -> bool {
        self.is_traversable() || (self.usage() == TileUsage::DoorFrame && !self.locked)
    }

    /// Whether this tile is part of a wall outline.
    pub fn is_wall(&self) -> bool {
        matches!(
            self.kind,
            TileKind::Wall(_) | TileKind::WallCorner(_) | TileKind::WallCornerOutside(_)
        )
    }

    /// Rendering yaw in degrees for the external renderer.
    pub fn orientation_degrees(&self) -> f32 {
        match self.kind {
            TileKind::Wall(Direction::West)
            | TileKind::WallCornerOutside(Corner::Southwest)
            | TileKind::WallCorner(Corner::Southeast)
            | TileKind::StairBase(Direction::West)
            | TileKind::StairTop(Direction::West)
            | TileKind::DoorFrame(Direction::South) => 270.0,
            TileKind::Wall(Direction::East)
            | TileKind::WallCornerOutside(Corner::Northeast)
            | TileKind::WallCorner(Corner::Northwest)
            | TileKind::StairBase(Direction::East)
            | TileKind::StairTop(Direction::East)
            | TileKind::DoorFrame(Direction::North) => 90.0,
            TileKind::Wall(Direction::South)
            | TileKind::WallCornerOutside(Corner::Southeast)
            | TileKind::WallCorner(Corner::Southwest)
            | TileKind::StairBase(Direction::North)
            | TileKind::StairTop(Direction::North)
            | TileKind::DoorFrame(Direction::West) => 180.0,
            _ => 0.0,
        }
    }
}

/// Room bookkeeping retained while a level is being generated.
///
/// Tiles are stamped directly into the parent grid; the room value keeps the
/// footprint, the sector id assigned by the flood fill, and the template that
/// produced it for entrance/exit selection and sector-to-room mapping.
#[derive(Debug, Clone)]
pub struct Room {
    /// Top-left of this room's footprint in the parent grid.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Sector id shared by this room's tiles; 0 until sectors are computed.
    pub sector_id: u32,
    /// Template used to create this room; `None` is the empty fallback.
    pub template: Option<usize>,
}

impl Room {
    /// The grid position at the room's center.
    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Whether `pos` falls inside the room footprint.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x
            && pos.y >= self.y
            && pos.x < self.x + self.width
            && pos.y < self.y + self.height
    }
}

/// A 2D grid of tiles with row-major storage.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    nil: Tile,
}

impl TileGrid {
    /// Creates a grid of the given dimensions filled with empty tiles.
    pub fn new(width: i32, height: i32) -> Self {
        let mut grid = Self {
            width: 0,
            height: 0,
            tiles: Vec::new(),
            nil: Tile::sentinel(),
        };
        grid.resize(width, height);
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Reallocates the backing storage and re-stamps every tile's
    /// coordinates.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width.max(0);
        self.height = height.max(0);
        self.tiles = vec![Tile::default(); (self.width * self.height) as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                self.tiles[idx].position = Position::new(x, y);
            }
        }
    }

    /// Resets every tile to the empty state, keeping the dimensions.
    pub fn reset(&mut self) {
        let (w, h) = (self.width, self.height);
        self.resize(w, h);
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Reads the tile at `pos`. Out-of-bounds reads return the shared
    /// sentinel so callers can always dereference safely.
    pub fn tile(&self, pos: Position) -> &Tile {
        if self.in_bounds(pos) {
            &self.tiles[(pos.y * self.width + pos.x) as usize]
        } else {
            &self.nil
        }
    }

    /// Mutable access to the tile at `pos`. Out-of-bounds writes are a
    /// contract violation surfaced as an error.
    pub fn tile_mut(&mut self, pos: Position) -> UndercroftResult<&mut Tile> {
        if self.in_bounds(pos) {
            Ok(&mut self.tiles[(pos.y * self.width + pos.x) as usize])
        } else {
            Err(UndercroftError::OutOfBounds { x: pos.x, y: pos.y })
        }
    }

    /// Sets the tile kind at `pos`, keeping the rest of the tile intact.
    pub fn set_kind(&mut self, pos: Position, kind: TileKind) -> UndercroftResult<()> {
        self.tile_mut(pos)?.kind = kind;
        Ok(())
    }

    /// Iterates tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Iterates tiles mutably in row-major order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_manhattan_distance() {
        let a = Position::new(1, 2);
        let b = Position::new(4, 6);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(b.manhattan_distance(a), 7);
    }

    #[test]
    fn test_direction_round_trip() {
        for dir in Direction::cardinal() {
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::from_token("ne"), Some(Direction::Northeast));
        assert_eq!(Direction::from_token("up"), None);
    }

    #[test]
    fn test_tile_usage_collapses_orientation() {
        let mut tile = Tile::default();
        tile.kind = TileKind::Wall(Direction::North);
        assert_eq!(tile.usage(), TileUsage::Wall);
        tile.kind = TileKind::Wall(Direction::East);
        assert_eq!(tile.usage(), TileUsage::Wall);
        tile.kind = TileKind::DoorFrame(Direction::South);
        assert_eq!(tile.usage(), TileUsage::DoorFrame);
        tile.kind = TileKind::WallCornerOutside(Corner::Northwest);
        assert_eq!(tile.usage(), TileUsage::WallCornerOutside);
    }

    #[test]
    fn test_door_frame_fill_passability_follows_lock() {
        let mut tile = Tile::default();
        tile.kind = TileKind::DoorFrame(Direction::North);
        assert!(tile.is_fill_passable());
        tile.locked = true;
        assert!(!tile.is_fill_passable());
        assert!(!tile.is_traversable());
    }

    #[test]
    fn test_grid_out_of_bounds_read_returns_sentinel() {
        let grid = TileGrid::new(4, 4);
        let tile = grid.tile(Position::new(-1, 10));
        assert_eq!(tile.kind, TileKind::None);
        assert_eq!(tile.sector_id, 0);
    }

    #[test]
    fn test_grid_out_of_bounds_write_is_error() {
        let mut grid = TileGrid::new(4, 4);
        assert!(grid.set_kind(Position::new(0, 0), TileKind::Floor).is_ok());
        assert!(grid.set_kind(Position::new(4, 0), TileKind::Floor).is_err());
        assert!(grid.set_kind(Position::new(0, -1), TileKind::Floor).is_err());
    }

    #[test]
    fn test_resize_restamps_coordinates() {
        let mut grid = TileGrid::new(2, 2);
        grid.resize(3, 3);
        assert_eq!(grid.tile(Position::new(2, 1)).position, Position::new(2, 1));
        assert_eq!(grid.tile(Position::new(0, 2)).position, Position::new(0, 2));
    }

    #[test]
    fn test_room_center_and_contains() {
        let room = Room {
            x: 5,
            y: 5,
            width: 8,
            height: 6,
            sector_id: 0,
            template: None,
        };
        assert_eq!(room.center(), Position::new(9, 8));
        assert!(room.contains(Position::new(5, 5)));
        assert!(room.contains(Position::new(12, 10)));
        assert!(!room.contains(Position::new(13, 10)));
    }
}
