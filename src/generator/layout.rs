//! Room growth and carving.
//!
//! The layout grows outward from a centered seed room: pick a source room
//! (weighted by the direction bias), find a straight wall tile on it, size a
//! new room from a template, and stamp it on the far side of that wall if the
//! space is free. Connections carve both facing wall tiles, become stairs
//! when the rooms sit at different elevations, and repair the four flanking
//! wall tiles so the opening reads as outside corners.

use super::DungeonGenerator;
use crate::grid::{Corner, Direction, Position, Room, Tile, TileKind, TileUsage};
use crate::rules::RuleContext;
use crate::{UndercroftError, UndercroftResult};
use log::debug;
use rand::Rng;

/// A straight wall tile where a connection can be carved, plus the outward
/// direction a new room would grow in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct DoorSite {
    pub pos: Position,
    pub dir: Direction,
}

impl DungeonGenerator {
    /// Places the first room in the center of the grid at elevation zero.
    pub(super) fn place_seed_room(&mut self) -> UndercroftResult<()> {
        let template = self.pick_template();
        let (w, h) = self.room_size(template);
        let x = self.params.width / 2 - w / 2;
        let y = self.params.height / 2 - h / 2;
        if !self.can_room_fit(x, y, w, h) {
            return Err(UndercroftError::GenerationFailed(format!(
                "seed room {}x{} does not fit a {}x{} grid",
                w, h, self.params.width, self.params.height
            )));
        }
        self.add_room(x, y, w, h, template, 0.0)
    }

    /// One growth attempt: most attempts fail quietly (no wall site found or
    /// no free space) and simply cost an iteration.
    pub(super) fn try_grow_room(&mut self) -> UndercroftResult<()> {
        let Some(site) = self.find_door_site() else {
            return Ok(());
        };
        let template = self.pick_template();
        let (w, h) = self.room_size(template);
        let (rx, ry) = match site.dir {
            Direction::North => (site.pos.x - w / 2, site.pos.y - h),
            Direction::South => (site.pos.x - w / 2, site.pos.y + 1),
            Direction::East => (site.pos.x + 1, site.pos.y - h / 2),
            Direction::West => (site.pos.x - w, site.pos.y - h / 2),
            _ => return Ok(()),
        };
        if !self.can_room_fit(rx, ry, w, h) {
            return Ok(());
        }

        let mut z = self.grid.tile(site.pos).z;
        let r = self.rng.gen::<f32>();
        if r <= self.params.vertical_chance {
            let up = self.params.vertical_bias_up - r;
            let down = self.params.vertical_bias_down - r;
            if up > down && self.params.vertical_bias_up != 0.0 {
                z += 1.0;
            } else if self.params.vertical_bias_down != 0.0 {
                z -= 1.0;
            }
        }

        self.add_room(rx, ry, w, h, template, z)?;
        self.connect_rooms(site.pos, site.dir)
    }

    /// Whether the rectangle is fully in bounds and touches only empty
    /// tiles.
    pub fn can_room_fit(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        for gy in y..y + h {
            for gx in x..x + w {
                let pos = Position::new(gx, gy);
                if !self.grid.in_bounds(pos) || self.grid.tile(pos).kind != TileKind::None {
                    return false;
                }
            }
        }
        true
    }

    /// First template whose rules pass, in catalog order. `None` means the
    /// empty fallback room.
    fn pick_template(&mut self) -> Option<usize> {
        let ctx = RuleContext {
            grid: &self.grid,
            rooms: &self.rooms,
            catalog: &self.catalog,
            depth: self.depth,
        };
        let probe = Tile::sentinel();
        let rng = &mut self.rng;
        let id = self
            .catalog
            .templates()
            .iter()
            .position(|t| t.rules.validate(&probe, &ctx, rng));
        if id.is_none() {
            debug!("No valid room template at depth {}; using empty room", self.depth);
        }
        id
    }

    /// Room dimensions from the global bounds, overridden per axis by the
    /// template where it specifies them.
    fn room_size(&mut self, template: Option<usize>) -> (i32, i32) {
        let mut min_w = self.params.min_room_width;
        let mut max_w = self.params.max_room_width;
        let mut min_h = self.params.min_room_height;
        let mut max_h = self.params.max_room_height;
        if let Some(template) = template.and_then(|id| self.catalog.template(id)) {
            if let Some((w, h)) = template.min_size {
                if w > 0 {
                    min_w = w;
                }
                if h > 0 {
                    min_h = h;
                }
            }
            if let Some((w, h)) = template.max_size {
                if w > 0 {
                    max_w = w;
                }
                if h > 0 {
                    max_h = h;
                }
            }
        }
        let w = self.rng.gen_range(min_w..=max_w.max(min_w));
        let h = self.rng.gen_range(min_h..=max_h.max(min_h));
        (w, h)
    }

    /// Picks a source room (weighted toward the direction bias) and samples
    /// its footprint for a straight wall tile.
    fn find_door_site(&mut self) -> Option<DoorSite> {
        let (bias_x, bias_y) = self.params.direction_bias;
        let weights: Vec<f32> = self
            .rooms
            .iter()
            .map(|r| (r.x.abs() as f32) * bias_x + (r.y.abs() as f32) * bias_y)
            .collect();
        let index = self.weighted_pick(&weights)?;
        let room = self.rooms[index].clone();

        let attempts = room.width * room.height;
        for _ in 0..attempts {
            let pos = Position::new(
                self.rng.gen_range(room.x..room.x + room.width),
                self.rng.gen_range(room.y..room.y + room.height),
            );
            if let TileKind::Wall(dir) = self.grid.tile(pos).kind {
                return Some(DoorSite { pos, dir });
            }
        }
        None
    }

    /// Stamps a room's outline and floor into the grid and registers it.
    fn add_room(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        template: Option<usize>,
        z: f32,
    ) -> UndercroftResult<()> {
        let room_index = self.rooms.len();
        self.rooms.push(Room {
            x,
            y,
            width: w,
            height: h,
            sector_id: 0,
            template,
        });

        for ly in 0..h {
            for lx in 0..w {
                let kind = if lx == 0 && ly == 0 {
                    TileKind::WallCorner(Corner::Northwest)
                } else if lx == w - 1 && ly == 0 {
                    TileKind::WallCorner(Corner::Northeast)
                } else if lx == 0 && ly == h - 1 {
                    TileKind::WallCorner(Corner::Southwest)
                } else if lx == w - 1 && ly == h - 1 {
                    TileKind::WallCorner(Corner::Southeast)
                } else if lx == 0 {
                    TileKind::Wall(Direction::West)
                } else if lx == w - 1 {
                    TileKind::Wall(Direction::East)
                } else if ly == 0 {
                    TileKind::Wall(Direction::North)
                } else if ly == h - 1 {
                    TileKind::Wall(Direction::South)
                } else {
                    TileKind::Floor
                };
                let tile = self.grid.tile_mut(Position::new(x + lx, y + ly))?;
                tile.kind = kind;
                tile.z = z;
                tile.room = Some(room_index);
                tile.template = template;
            }
        }

        if let Some(id) = template {
            self.catalog.commit_template(id);
        }
        Ok(())
    }

    /// Carves the connection through `door` (on the source room's wall) and
    /// the facing tile of the new room, then repairs the four flanks.
    ///
    /// Same elevation: the far tile becomes a door frame (when the new
    /// room's template has a door style and the door chance passes) or open
    /// floor. Different elevation: both tiles become a stair pair whose
    /// direction payload is the ascent direction.
    fn connect_rooms(&mut self, door: Position, dir: Direction) -> UndercroftResult<()> {
        let inner = door.step(dir, 1);
        let z_door = self.grid.tile(door).z;
        let z_inner = self.grid.tile(inner).z;

        self.grid.set_kind(door, TileKind::Floor)?;

        if z_door > z_inner {
            let ascent = dir.opposite();
            self.grid.set_kind(inner, TileKind::StairBase(ascent))?;
            self.grid.set_kind(door, TileKind::StairTop(ascent))?;
        } else if z_door < z_inner {
            self.grid.set_kind(door, TileKind::StairBase(dir))?;
            self.grid.set_kind(inner, TileKind::StairTop(dir))?;
        } else {
            let has_door_style = self
                .grid
                .tile(inner)
                .template
                .and_then(|id| self.catalog.template(id))
                .is_some_and(|t| t.has_style_for_usage(TileUsage::Door));
            let chance = self.params.door_chance;
            if has_door_style && self.percent_check(chance) {
                self.grid.set_kind(inner, TileKind::DoorFrame(dir))?;
            } else {
                self.grid.set_kind(inner, TileKind::Floor)?;
            }
        }

        let vertical = matches!(dir, Direction::North | Direction::South);
        for flank_of in [door, inner] {
            for side in [-1, 1] {
                let pos = if vertical {
                    Position::new(flank_of.x + side, flank_of.y)
                } else {
                    Position::new(flank_of.x, flank_of.y + side)
                };
                self.repair_flank(pos, door, vertical)?;
            }
        }
        Ok(())
    }

    /// Turns a straight wall beside a fresh opening into an outside corner;
    /// other wall tiles become a side wall facing the opening. Tiles already
    /// carved by an earlier opening are left alone so it stays open.
    fn repair_flank(&mut self, pos: Position, door: Position, vertical: bool) -> UndercroftResult<()> {
        let kind = self.grid.tile(pos).kind;
        if !self.grid.tile(pos).is_wall() {
            return Ok(());
        }
        let repaired = if vertical {
            let side = if pos.x < door.x {
                Direction::West
            } else {
                Direction::East
            };
            match kind {
                TileKind::Wall(Direction::North) => TileKind::WallCornerOutside(corner(
                    Direction::North,
                    side,
                )),
                TileKind::Wall(Direction::South) => TileKind::WallCornerOutside(corner(
                    Direction::South,
                    side,
                )),
                _ => TileKind::Wall(side),
            }
        } else {
            let vert = if pos.y < door.y {
                Direction::North
            } else {
                Direction::South
            };
            match kind {
                TileKind::Wall(Direction::West) => {
                    TileKind::WallCornerOutside(corner(vert, Direction::West))
                }
                TileKind::Wall(Direction::East) => {
                    TileKind::WallCornerOutside(corner(vert, Direction::East))
                }
                _ => TileKind::Wall(vert),
            }
        };
        self.grid.set_kind(pos, repaired)
    }

    /// Records every door-frame tile carved by the growth phase.
    pub(super) fn gather_doors(&mut self) {
        self.doors = self
            .grid
            .iter()
            .filter(|t| t.usage() == TileUsage::DoorFrame)
            .map(|t| t.position)
            .collect();
    }
}

fn corner(vert: Direction, horiz: Direction) -> Corner {
    match (vert, horiz) {
        (Direction::North, Direction::West) => Corner::Northwest,
        (Direction::North, _) => Corner::Northeast,
        (_, Direction::West) => Corner::Southwest,
        _ => Corner::Southeast,
    }
}
