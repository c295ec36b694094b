//! Connectivity analysis.
//!
//! After doors are locked, the walkable tiles split into sectors: maximal
//! regions connected through floor-like tiles and unlocked door frames. Each
//! locked door frame contributes one edge to the sector graph, from the
//! sector on its source side (`pos - dir`) to the sector it opens onto
//! (`pos + dir`).

use super::DungeonGenerator;
use crate::catalog::Color;
use crate::grid::{Direction, Position, TileKind};
use crate::UndercroftResult;
use log::debug;
use std::collections::BTreeMap;

/// The sector adjacency derived from locked doors.
#[derive(Debug, Clone, Default)]
pub struct SectorGraph {
    /// Undirected adjacency: both endpoints of every locked door.
    pub adjacency: BTreeMap<u32, Vec<u32>>,
    /// A representative door-flank tile inside each sector, used as the
    /// reference point for key-distance sorting.
    pub door_flanks: BTreeMap<u32, Position>,
}

impl SectorGraph {
    /// Neighbors of `sector`; empty for unknown ids.
    pub fn neighbors(&self, sector: u32) -> &[u32] {
        self.adjacency.get(&sector).map_or(&[], Vec::as_slice)
    }
}

impl DungeonGenerator {
    /// Rolls the lock chance for every door frame, in carve order.
    fn lock_random_doors(&mut self) -> UndercroftResult<()> {
        let chance = self.params.lock_chance;
        for i in 0..self.doors.len() {
            let pos = self.doors[i];
            let locked = self.percent_check(chance);
            self.grid.tile_mut(pos)?.locked = locked;
        }
        Ok(())
    }

    /// Locks doors, assigns sector ids by flood fill, and derives the sector
    /// graph.
    ///
    /// After this pass `sector_id == 0` holds only for empty tiles: wall
    /// tiles the fill cannot reach inherit their room's sector, and locked
    /// door frames take the sector of their source side.
    pub(super) fn calculate_sectors(&mut self) -> UndercroftResult<SectorGraph> {
        self.lock_random_doors()?;

        let mut next_id = 1u32;
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let pos = Position::new(x, y);
                let tile = self.grid.tile(pos);
                if tile.sector_id == 0 && tile.is_fill_passable() {
                    self.flood_fill(pos, next_id)?;
                    let color = Color::random(&mut self.rng);
                    self.sector_colors.insert(next_id, color);
                    next_id += 1;
                }
            }
        }
        debug!("Sectors created: {}", self.sector_colors.len());

        // Unreachable non-empty tiles (walls, locked door frames) take their
        // room's sector.
        for room_index in 0..self.rooms.len() {
            let sector = self.rooms[room_index].sector_id;
            if sector == 0 {
                continue;
            }
            let room = self.rooms[room_index].clone();
            for y in room.y..room.y + room.height {
                for x in room.x..room.x + room.width {
                    let tile = self.grid.tile_mut(Position::new(x, y))?;
                    if tile.kind != TileKind::None && tile.sector_id == 0 {
                        tile.sector_id = sector;
                    }
                }
            }
        }

        let mut graph = SectorGraph::default();
        for i in 0..self.doors.len() {
            let pos = self.doors[i];
            let tile = self.grid.tile(pos);
            if !tile.locked {
                continue;
            }
            let TileKind::DoorFrame(dir) = tile.kind else {
                continue;
            };
            let outer = pos.step(dir, -1);
            let inner = pos.step(dir, 1);
            let start = self.grid.tile(outer).sector_id;
            let end = self.grid.tile(inner).sector_id;
            debug!("Locked door at ({}, {}) joins {} and {}", pos.x, pos.y, start, end);
            graph.adjacency.entry(start).or_default().push(end);
            graph.adjacency.entry(end).or_default().push(start);
            graph.door_flanks.insert(start, outer);
            graph.door_flanks.insert(end, inner);
            self.grid.tile_mut(pos)?.sector_id = start;
        }
        Ok(graph)
    }

    /// Iterative flood fill with an explicit stack: deep layouts must not be
    /// limited by the call stack.
    fn flood_fill(&mut self, start: Position, dest: u32) -> UndercroftResult<()> {
        let mut stack = vec![start];
        while let Some(pos) = stack.pop() {
            let tile = self.grid.tile(pos);
            if tile.sector_id != 0 || !tile.is_fill_passable() {
                continue;
            }
            let room = tile.room;
            let is_floor = tile.kind == TileKind::Floor;
            self.grid.tile_mut(pos)?.sector_id = dest;
            if let Some(room) = room.and_then(|idx| self.rooms.get_mut(idx)) {
                room.sector_id = dest;
            }
            if is_floor {
                self.tiles_by_sector.entry(dest).or_default().push(pos);
            }
            for dir in Direction::cardinal() {
                stack.push(pos.step(dir, 1));
            }
        }
        Ok(())
    }

    /// The room carrying `sector_id`, if any.
    pub(super) fn room_by_sector(&self, sector_id: u32) -> Option<usize> {
        self.rooms.iter().position(|r| r.sector_id == sector_id)
    }
}
