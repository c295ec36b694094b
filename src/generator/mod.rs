//! # Generation Session
//!
//! [`DungeonGenerator`] owns everything one level generation needs: the tile
//! grid, the template catalog, the PRNG, and the per-pass bookkeeping (rooms,
//! doors, sectors, visitation order, pending keys). One `generate()` call
//! produces one complete level synchronously.
//!
//! The pipeline stages live in submodules: room growth and carving in
//! `layout`, sector flood fill in `sectors`, the key/lock plan in
//! `progression`, and entity emission in `spawn`.

mod layout;
mod progression;
mod sectors;
mod spawn;

pub use sectors::SectorGraph;
pub use spawn::{DoorPlacement, SpawnRequest, WorldSink};

use crate::catalog::{CatalogDef, Color, KeyStyle, TemplateCatalog};
use crate::grid::{Position, Room, TileGrid, TileKind};
use crate::{UndercroftError, UndercroftResult};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunable parameters for one generation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub width: i32,
    pub height: i32,
    /// Upper bound on rooms per level; 0 means bounded only by space.
    pub max_room_count: u32,
    pub min_room_width: i32,
    pub max_room_width: i32,
    pub min_room_height: i32,
    pub max_room_height: i32,
    /// Chance a new room shifts elevation relative to its parent.
    pub vertical_chance: f32,
    pub vertical_bias_up: f32,
    pub vertical_bias_down: f32,
    /// Pulls room growth toward a map direction; (0, 0) is unbiased.
    pub direction_bias: (f32, f32),
    /// Chance a room connection gets a door frame instead of an open floor.
    pub door_chance: f32,
    /// Chance each door frame starts locked.
    pub lock_chance: f32,
    /// Dungeon display name, used to derive per-floor names.
    pub name: String,
    pub seed: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationParams {
    /// Default parameters for a full-size level.
    pub fn new() -> Self {
        Self {
            width: 80,
            height: 50,
            max_room_count: 0,
            min_room_width: 6,
            max_room_width: 14,
            min_room_height: 6,
            max_room_height: 10,
            vertical_chance: 0.55,
            vertical_bias_up: 0.5,
            vertical_bias_down: 0.5,
            direction_bias: (0.0, 0.0),
            door_chance: 0.5,
            lock_chance: 0.5,
            name: "Undercroft".to_string(),
            seed: 0,
        }
    }

    /// Small fixed-seed parameters for fast tests.
    pub fn for_testing() -> Self {
        Self {
            width: 30,
            height: 30,
            max_room_count: 6,
            min_room_width: 5,
            max_room_width: 8,
            min_room_height: 5,
            max_room_height: 8,
            seed: 42,
            ..Self::new()
        }
    }
}

/// A complete declarative level description: parameters plus catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub params: GenerationParams,
    #[serde(default)]
    pub catalog: CatalogDef,
}

/// A grid position plus vertical elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub position: Position,
    pub elevation: f32,
}

/// A key planned for spawning, opening the doors into `target_sector`.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub target_sector: u32,
    pub style: String,
    pub color: Color,
    pub location: Location,
}

/// One level-generation session.
pub struct DungeonGenerator {
    params: GenerationParams,
    grid: TileGrid,
    catalog: TemplateCatalog,
    rng: StdRng,
    rooms: Vec<Room>,
    /// Door-frame tiles, in carve order.
    doors: Vec<Position>,
    /// Floor tiles per sector, in fill order.
    tiles_by_sector: BTreeMap<u32, Vec<Position>>,
    sector_colors: BTreeMap<u32, Color>,
    /// Keys planned by the progression walk, keyed by target sector.
    keys_to_spawn: BTreeMap<u32, Key>,
    order_of_visitation: Vec<u32>,
    entrance: Option<Location>,
    exit: Option<Location>,
    depth: i32,
    floor_name: String,
    key_styles: Vec<KeyStyle>,
}

impl DungeonGenerator {
    /// Creates a session from parameters and a built catalog.
    pub fn new(params: GenerationParams, catalog: TemplateCatalog) -> Self {
        let mut key_styles = catalog.key_styles().to_vec();
        if key_styles.is_empty() {
            key_styles.push(KeyStyle::default());
        }
        Self {
            grid: TileGrid::new(params.width, params.height),
            rng: StdRng::seed_from_u64(params.seed),
            catalog,
            rooms: Vec::new(),
            doors: Vec::new(),
            tiles_by_sector: BTreeMap::new(),
            sector_colors: BTreeMap::new(),
            keys_to_spawn: BTreeMap::new(),
            order_of_visitation: Vec::new(),
            entrance: None,
            exit: None,
            depth: 0,
            floor_name: String::new(),
            key_styles,
            params,
        }
    }

    /// Creates a session from a declarative level spec.
    pub fn from_spec(spec: &LevelSpec) -> Self {
        Self::new(spec.params.clone(), spec.catalog.build())
    }

    /// Generates the next floor. Each call descends one depth and rebuilds
    /// the grid from scratch; the PRNG is reseeded from `seed + depth` so a
    /// given floor of a given seed is always the same.
    pub fn generate(&mut self) -> UndercroftResult<()> {
        self.clear();
        self.depth += 1;
        self.rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(self.depth as u64));
        self.floor_name = format!("{} Level {}", self.params.name, self.depth);

        let min_w = self.params.min_room_width + 2;
        let min_h = self.params.min_room_height + 2;
        if self.params.width < min_w || self.params.height < min_h {
            return Err(UndercroftError::GenerationFailed(format!(
                "grid {}x{} cannot hold a {}x{} room",
                self.params.width, self.params.height, min_w, min_h
            )));
        }

        info!("Generating '{}'", self.floor_name);
        self.place_seed_room()?;

        let attempts = self.params.width * self.params.height * 2;
        for _ in 0..attempts {
            if self.params.max_room_count > 0
                && self.rooms.len() as u32 >= self.params.max_room_count
            {
                break;
            }
            self.try_grow_room()?;
        }
        info!("Placed {} rooms", self.rooms.len());

        self.gather_doors();
        self.place_entrance()?;
        let graph = self.calculate_sectors()?;
        if self.entrance.is_some() {
            self.plan_progression(&graph)?;
            self.place_exit()?;
        }
        self.generate_spawn_data()?;
        Ok(())
    }

    /// Resets all per-pass state, keeping the parameters, catalog
    /// definitions, and the depth counter.
    pub fn clear(&mut self) {
        self.grid.reset();
        self.rooms.clear();
        self.doors.clear();
        self.tiles_by_sector.clear();
        self.sector_colors.clear();
        self.keys_to_spawn.clear();
        self.order_of_visitation.clear();
        self.entrance = None;
        self.exit = None;
        self.catalog.reset_all();
    }

    /// Renders the layout as one character per tile, rows separated by
    /// newlines.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(
            ((self.grid.width() + 1) * self.grid.height()) as usize,
        );
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let tile = self.grid.tile(Position::new(x, y));
                out.push(match tile.kind {
                    TileKind::None => ' ',
                    TileKind::Floor => '.',
                    TileKind::StairBase(_) => '<',
                    TileKind::StairTop(_) => '>',
                    TileKind::Exit => 'X',
                    TileKind::Entrance => 'E',
                    TileKind::Wall(d) => match d.to_delta().x {
                        0 => '-',
                        _ => '|',
                    },
                    TileKind::WallCorner(_) | TileKind::WallCornerOutside(_) => '#',
                    TileKind::DoorFrame(_) | TileKind::Door => '+',
                });
            }
            out.push('\n');
        }
        out
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn entrance_location(&self) -> Option<Location> {
        self.entrance
    }

    pub fn exit_location(&self) -> Option<Location> {
        self.exit
    }

    /// Door-frame tiles of the current layout, in carve order.
    pub fn door_locations(&self) -> &[Position] {
        &self.doors
    }

    /// Sector ids in the order the progression plan visits them.
    pub fn visitation_order(&self) -> &[u32] {
        &self.order_of_visitation
    }

    /// Keys planned by the progression walk, keyed by target sector.
    pub fn planned_keys(&self) -> &BTreeMap<u32, Key> {
        &self.keys_to_spawn
    }

    /// Debug tint for a sector; grey for unknown ids.
    pub fn color_for_sector(&self, sector: u32) -> Color {
        self.sector_colors.get(&sector).copied().unwrap_or(Color::GREY)
    }

    pub fn floor_name(&self) -> &str {
        &self.floor_name
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Rolls a probability in `[0, 1]`; non-positive never passes.
    fn percent_check(&mut self, chance: f32) -> bool {
        chance > 0.0 && self.rng.gen::<f32>() <= chance
    }

    /// Picks an index with probability proportional to its weight. Falls
    /// back to a uniform pick when no weight is positive.
    fn weighted_pick(&mut self, weights: &[f32]) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }
        let total: f32 = weights.iter().map(|w| w.max(0.0)).sum();
        if total <= 0.0 {
            return Some(self.rng.gen_range(0..weights.len()));
        }
        let mut roll = self.rng.gen_range(0.0..total);
        for (i, w) in weights.iter().enumerate() {
            let w = w.max(0.0);
            if roll < w {
                return Some(i);
            }
            roll -= w;
        }
        Some(weights.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let params = GenerationParams::new();
        assert_eq!(params.max_room_count, 0);
        assert!(params.min_room_width <= params.max_room_width);
        assert!(params.min_room_height <= params.max_room_height);
    }

    #[test]
    fn test_generate_fails_on_tiny_grid() {
        let mut params = GenerationParams::for_testing();
        params.width = 4;
        params.height = 4;
        let mut gen = DungeonGenerator::new(params, TemplateCatalog::new());
        assert!(gen.generate().is_err());
    }

    #[test]
    fn test_depth_and_floor_name_advance() {
        let mut gen =
            DungeonGenerator::new(GenerationParams::for_testing(), TemplateCatalog::new());
        assert_eq!(gen.depth(), 0);
        gen.generate().unwrap();
        assert_eq!(gen.depth(), 1);
        assert_eq!(gen.floor_name(), "Undercroft Level 1");
        gen.generate().unwrap();
        assert_eq!(gen.depth(), 2);
        assert_eq!(gen.floor_name(), "Undercroft Level 2");
    }

    #[test]
    fn test_weighted_pick_zero_weights_uniform() {
        let mut gen =
            DungeonGenerator::new(GenerationParams::for_testing(), TemplateCatalog::new());
        for _ in 0..16 {
            let pick = gen.weighted_pick(&[0.0, 0.0, 0.0]).unwrap();
            assert!(pick < 3);
        }
        assert_eq!(gen.weighted_pick(&[]), None);
        assert_eq!(gen.weighted_pick(&[0.0, 5.0, 0.0]), Some(1));
    }

    #[test]
    fn test_percent_check_bounds() {
        let mut gen =
            DungeonGenerator::new(GenerationParams::for_testing(), TemplateCatalog::new());
        for _ in 0..32 {
            assert!(!gen.percent_check(0.0));
            assert!(gen.percent_check(1.0));
        }
    }
}
