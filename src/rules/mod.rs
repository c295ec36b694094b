//! # Rule Engine
//!
//! Placement predicates evaluated against candidate tiles.
//!
//! A [`Rule`] is one closed-enum predicate; a [`RuleSet`] is the conjunction
//! of its rules with short-circuit evaluation. Rules are stateless except for
//! `MaxCount`, which tracks a remaining-budget counter: validation never
//! mutates, and a caller that acts on a passing rule set reports back through
//! [`RuleSet::notify_success`] so counters only decrement for placements that
//! actually happened.
//!
//! Tile-relative rules probe the grid through a [`RuleContext`], which also
//! resolves style/object ids to their catalog names for target matching.

pub mod depth;

pub use depth::{parse_depth_list, DepthSpec};

use crate::catalog::TemplateCatalog;
use crate::grid::{Direction, Room, Tile, TileGrid, TileUsage};
use rand::Rng;

/// Read-only view of the generation state a rule may inspect.
pub struct RuleContext<'a> {
    pub grid: &'a TileGrid,
    pub rooms: &'a [Room],
    pub catalog: &'a TemplateCatalog,
    /// Current dungeon depth, starting at 1.
    pub depth: i32,
}

/// What a tile-relative rule is looking for on the probed tiles.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetMatcher {
    /// Any of these semantic tile roles.
    Usage(Vec<TileUsage>),
    /// A tile whose resolved object has one of these catalog names.
    Object(Vec<String>),
    /// A tile whose resolved style has one of these catalog names.
    Style(Vec<String>),
}

impl TargetMatcher {
    /// Whether `tile` is what this matcher is looking for.
    pub fn matches(&self, tile: &Tile, ctx: &RuleContext) -> bool {
        match self {
            TargetMatcher::Usage(usages) => usages.contains(&tile.usage()),
            TargetMatcher::Object(names) => tile
                .object
                .and_then(|id| ctx.catalog.object(id))
                .map_or(false, |obj| names.iter().any(|n| *n == obj.name)),
            TargetMatcher::Style(names) => tile
                .style
                .and_then(|id| ctx.catalog.style(id))
                .map_or(false, |style| names.iter().any(|n| *n == style.name)),
        }
    }
}

/// A set of probe directions, stored as a bitmask over the eight octants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionSet(u8);

const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
    Direction::Northeast,
    Direction::Northwest,
    Direction::Southeast,
    Direction::Southwest,
];

impl DirectionSet {
    /// All eight directions.
    pub fn all() -> Self {
        Self(0xff)
    }

    /// The four cardinal directions.
    pub fn cardinals() -> Self {
        let mut set = Self::empty();
        for dir in Direction::cardinal() {
            set.insert(dir);
        }
        set
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn bit(dir: Direction) -> u8 {
        let idx = ALL_DIRECTIONS.iter().position(|d| *d == dir).unwrap_or(0);
        1 << idx
    }

    pub fn insert(&mut self, dir: Direction) {
        self.0 |= Self::bit(dir);
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & Self::bit(dir) != 0
    }

    /// Iterates the contained directions in a fixed order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        ALL_DIRECTIONS
            .into_iter()
            .filter(move |d| self.contains(*d))
    }
}

impl Default for DirectionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// A single placement predicate.
///
/// `sense` on the adjacency/containment variants selects between the positive
/// ("must be near/contain") and negative ("must not") forms of the same scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Passes with probability `chance`; a non-positive chance never passes.
    Random { chance: f32 },
    /// Passes only on tiles with one of these roles.
    CanSpawnOn { usages: Vec<TileUsage> },
    /// Fails on tiles with one of these roles.
    CanNotSpawnOn { usages: Vec<TileUsage> },
    /// Passes while the remaining budget is positive; the budget decrements
    /// on `notify_success` and restores on `reset`.
    MaxCount { max: u32, remaining: u32 },
    /// Probes neighbors up to `1 + margin` steps away in each direction of
    /// `directions`. Passes when a probe matches iff `sense` is true.
    Adjacency {
        sense: bool,
        margin: i32,
        directions: DirectionSet,
        target: TargetMatcher,
    },
    /// Scans the candidate tile's room for matching tiles. Passes when at
    /// least one match exists and every match lies at Manhattan distance
    /// `>= min` and, if `max` is positive, `<= max`.
    Distance {
        min: f32,
        max: f32,
        target: TargetMatcher,
    },
    /// Scans the candidate tile's room for a match. Passes when a match
    /// exists iff `sense` is true. A tile outside any room has no contents,
    /// so only the negative form passes there.
    RoomContains { sense: bool, target: TargetMatcher },
    /// Passes when the current depth satisfies any of the specs.
    ValidDepths { depths: Vec<DepthSpec> },
}

impl Rule {
    /// Evaluates this rule against `tile`. Never mutates rule state.
    pub fn validate<R: Rng>(&self, tile: &Tile, ctx: &RuleContext, rng: &mut R) -> bool {
        match self {
            Rule::Random { chance } => *chance > 0.0 && rng.gen::<f32>() <= *chance,
            Rule::CanSpawnOn { usages } => usages.contains(&tile.usage()),
            Rule::CanNotSpawnOn { usages } => !usages.contains(&tile.usage()),
            Rule::MaxCount { remaining, .. } => *remaining > 0,
            Rule::Adjacency {
                sense,
                margin,
                directions,
                target,
            } => {
                let reach = 1 + (*margin).max(0);
                let found = directions.iter().any(|dir| {
                    (1..=reach).any(|step| {
                        let probe = ctx.grid.tile(tile.position.step(dir, step));
                        target.matches(probe, ctx)
                    })
                });
                found == *sense
            }
            Rule::Distance { min, max, target } => {
                if tile.usage() == TileUsage::None {
                    return false;
                }
                let Some(room) = tile.room.and_then(|idx| ctx.rooms.get(idx)) else {
                    return false;
                };
                let mut found = false;
                for other in room_tiles(room, ctx) {
                    if !target.matches(other, ctx) {
                        continue;
                    }
                    found = true;
                    let dist = tile.position.manhattan_distance(other.position) as f32;
                    if dist < *min || (*max > 0.0 && dist > *max) {
                        return false;
                    }
                }
                found
            }
            Rule::RoomContains { sense, target } => {
                let Some(room) = tile.room.and_then(|idx| ctx.rooms.get(idx)) else {
                    return !sense;
                };
                let found = room_tiles(room, ctx).any(|other| target.matches(other, ctx));
                found == *sense
            }
            Rule::ValidDepths { depths } => depths.iter().any(|spec| spec.matches(ctx.depth)),
        }
    }

    /// Commits a successful placement that this rule approved.
    pub fn notify_success(&mut self) {
        if let Rule::MaxCount { remaining, .. } = self {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Restores any per-pass state to its configured starting point.
    pub fn reset(&mut self) {
        if let Rule::MaxCount { max, remaining } = self {
            *remaining = *max;
        }
    }
}

fn room_tiles<'a>(room: &'a Room, ctx: &'a RuleContext) -> impl Iterator<Item = &'a Tile> {
    let (x0, y0) = (room.x, room.y);
    let (x1, y1) = (room.x + room.width, room.y + room.height);
    (y0..y1).flat_map(move |y| {
        (x0..x1).map(move |x| ctx.grid.tile(crate::grid::Position::new(x, y)))
    })
}

/// An ordered conjunction of rules with short-circuit evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when every rule passes. An empty set always passes.
    pub fn validate<R: Rng>(&self, tile: &Tile, ctx: &RuleContext, rng: &mut R) -> bool {
        self.rules.iter().all(|rule| rule.validate(tile, ctx, rng))
    }

    /// Commits a successful placement to every rule.
    pub fn notify_success(&mut self) {
        for rule in &mut self.rules {
            rule.notify_success();
        }
    }

    /// Restores per-pass state on every rule.
    pub fn reset(&mut self) {
        for rule in &mut self.rules {
            rule.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TemplateCatalog;
    use crate::grid::{Position, TileGrid, TileKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context<'a>(
        grid: &'a TileGrid,
        rooms: &'a [Room],
        catalog: &'a TemplateCatalog,
    ) -> RuleContext<'a> {
        RuleContext {
            grid,
            rooms,
            catalog,
            depth: 1,
        }
    }

    fn test_room() -> Room {
        Room {
            x: 0,
            y: 0,
            width: 5,
            height: 5,
            sector_id: 0,
            template: None,
        }
    }

    #[test]
    fn test_can_spawn_on() {
        let grid = TileGrid::new(3, 3);
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(7);

        let mut tile = Tile::default();
        tile.kind = TileKind::Floor;
        let rule = Rule::CanSpawnOn {
            usages: vec![TileUsage::Floor, TileUsage::Entrance],
        };
        assert!(rule.validate(&tile, &ctx, &mut rng));
        tile.kind = TileKind::Exit;
        assert!(!rule.validate(&tile, &ctx, &mut rng));

        let negative = Rule::CanNotSpawnOn {
            usages: vec![TileUsage::Exit],
        };
        assert!(!negative.validate(&tile, &ctx, &mut rng));
    }

    #[test]
    fn test_max_count_lifecycle() {
        let grid = TileGrid::new(1, 1);
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let tile = Tile::default();

        let mut rule = Rule::MaxCount {
            max: 2,
            remaining: 2,
        };
        assert!(rule.validate(&tile, &ctx, &mut rng));
        rule.notify_success();
        assert!(rule.validate(&tile, &ctx, &mut rng));
        rule.notify_success();
        assert!(!rule.validate(&tile, &ctx, &mut rng));
        rule.reset();
        assert!(rule.validate(&tile, &ctx, &mut rng));
    }

    #[test]
    fn test_random_chance_bounds() {
        let grid = TileGrid::new(1, 1);
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let tile = Tile::default();

        let never = Rule::Random { chance: 0.0 };
        let always = Rule::Random { chance: 1.0 };
        for _ in 0..32 {
            assert!(!never.validate(&tile, &ctx, &mut rng));
            assert!(always.validate(&tile, &ctx, &mut rng));
        }
    }

    #[test]
    fn test_adjacency_probe() {
        let mut grid = TileGrid::new(5, 5);
        grid.set_kind(Position::new(2, 1), TileKind::Wall(Direction::North))
            .unwrap();
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(1);

        let tile = grid.tile(Position::new(2, 2)).clone();
        let near_wall = Rule::Adjacency {
            sense: true,
            margin: 0,
            directions: DirectionSet::all(),
            target: TargetMatcher::Usage(vec![TileUsage::Wall]),
        };
        assert!(near_wall.validate(&tile, &ctx, &mut rng));

        let far_tile = grid.tile(Position::new(2, 4)).clone();
        assert!(!near_wall.validate(&far_tile, &ctx, &mut rng));

        // Margin 1 extends the probe two steps out.
        let near_wall_wide = Rule::Adjacency {
            sense: true,
            margin: 1,
            directions: DirectionSet::all(),
            target: TargetMatcher::Usage(vec![TileUsage::Wall]),
        };
        let mid_tile = grid.tile(Position::new(2, 3)).clone();
        assert!(near_wall_wide.validate(&mid_tile, &ctx, &mut rng));
    }

    #[test]
    fn test_room_contains() {
        let mut grid = TileGrid::new(5, 5);
        grid.set_kind(Position::new(4, 4), TileKind::Entrance).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                grid.tile_mut(Position::new(x, y)).unwrap().room = Some(0);
            }
        }
        let rooms = [test_room()];
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &rooms, &catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let tile = grid.tile(Position::new(0, 0)).clone();

        let has_entrance = Rule::RoomContains {
            sense: true,
            target: TargetMatcher::Usage(vec![TileUsage::Entrance]),
        };
        assert!(has_entrance.validate(&tile, &ctx, &mut rng));

        let has_exit = Rule::RoomContains {
            sense: false,
            target: TargetMatcher::Usage(vec![TileUsage::Exit]),
        };
        assert!(has_exit.validate(&tile, &ctx, &mut rng));

        // Outside any room only the negative form passes.
        let mut loose = Tile::default();
        loose.kind = TileKind::Floor;
        assert!(!has_entrance.validate(&loose, &ctx, &mut rng));
        assert!(has_exit.validate(&loose, &ctx, &mut rng));
    }

    #[test]
    fn test_distance_bounds() {
        let mut grid = TileGrid::new(5, 5);
        grid.set_kind(Position::new(0, 0), TileKind::Entrance).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                let tile = grid.tile_mut(Position::new(x, y)).unwrap();
                tile.room = Some(0);
                if tile.kind == TileKind::None {
                    tile.kind = TileKind::Floor;
                }
            }
        }
        let rooms = [test_room()];
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &rooms, &catalog);
        let mut rng = StdRng::seed_from_u64(1);

        let far_from_entrance = Rule::Distance {
            min: 3.0,
            max: 0.0,
            target: TargetMatcher::Usage(vec![TileUsage::Entrance]),
        };
        let near = grid.tile(Position::new(1, 1)).clone();
        let far = grid.tile(Position::new(4, 4)).clone();
        assert!(!far_from_entrance.validate(&near, &ctx, &mut rng));
        assert!(far_from_entrance.validate(&far, &ctx, &mut rng));

        // No matching tiles in the room means the rule cannot pass.
        let no_exit_nearby = Rule::Distance {
            min: 0.0,
            max: 10.0,
            target: TargetMatcher::Usage(vec![TileUsage::Exit]),
        };
        assert!(!no_exit_nearby.validate(&far, &ctx, &mut rng));
    }

    #[test]
    fn test_distance_counts_tiles_not_straight_lines() {
        let mut grid = TileGrid::new(5, 5);
        grid.set_kind(Position::new(0, 0), TileKind::Entrance).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                let tile = grid.tile_mut(Position::new(x, y)).unwrap();
                tile.room = Some(0);
                if tile.kind == TileKind::None {
                    tile.kind = TileKind::Floor;
                }
            }
        }
        let rooms = [test_room()];
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &rooms, &catalog);
        let mut rng = StdRng::seed_from_u64(1);

        // (3, 3) is 6 tiles from the entrance; a straight line would measure
        // only ~4.24 and get both bounds wrong.
        let diagonal = grid.tile(Position::new(3, 3)).clone();
        let min_five = Rule::Distance {
            min: 5.0,
            max: 0.0,
            target: TargetMatcher::Usage(vec![TileUsage::Entrance]),
        };
        assert!(min_five.validate(&diagonal, &ctx, &mut rng));

        let max_five = Rule::Distance {
            min: 0.0,
            max: 5.0,
            target: TargetMatcher::Usage(vec![TileUsage::Entrance]),
        };
        assert!(!max_five.validate(&diagonal, &ctx, &mut rng));
    }

    #[test]
    fn test_valid_depths() {
        let grid = TileGrid::new(1, 1);
        let catalog = TemplateCatalog::new();
        let mut ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let tile = Tile::default();

        let rule = Rule::ValidDepths {
            depths: parse_depth_list("3+"),
        };
        ctx.depth = 2;
        assert!(!rule.validate(&tile, &ctx, &mut rng));
        ctx.depth = 3;
        assert!(rule.validate(&tile, &ctx, &mut rng));
    }

    #[test]
    fn test_rule_set_conjunction() {
        let grid = TileGrid::new(1, 1);
        let catalog = TemplateCatalog::new();
        let ctx = context(&grid, &[], &catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let mut tile = Tile::default();
        tile.kind = TileKind::Floor;

        let mut set = RuleSet::new(vec![
            Rule::CanSpawnOn {
                usages: vec![TileUsage::Floor],
            },
            Rule::MaxCount {
                max: 1,
                remaining: 1,
            },
        ]);
        assert!(set.validate(&tile, &ctx, &mut rng));
        set.notify_success();
        assert!(!set.validate(&tile, &ctx, &mut rng));
        set.reset();
        assert!(set.validate(&tile, &ctx, &mut rng));
        assert!(RuleSet::default().validate(&tile, &ctx, &mut rng));
    }
}
