//! The key/lock progression plan.
//!
//! A random depth-first walk over the sector graph, starting at the
//! entrance's sector, produces the order sectors are meant to be visited in.
//! Each time the walk steps into a new sector it plants that sector's key in
//! the previously visited sector, among the floor tiles farthest from the
//! door being unlocked, so the player always holds the key before meeting
//! the lock.

use super::{DungeonGenerator, Key, Location, SectorGraph};
use crate::grid::{TileKind, TileUsage};
use crate::UndercroftResult;
use log::{debug, warn};
use rand::Rng;
use std::cmp::Reverse;
use std::collections::BTreeSet;

impl DungeonGenerator {
    /// Marks the center tile of a random entrance-capable room as the
    /// entrance. Without one the level has no start, so the progression plan
    /// and exit placement are skipped by the caller.
    pub(super) fn place_entrance(&mut self) -> UndercroftResult<()> {
        let candidates: Vec<usize> = self
            .rooms
            .iter()
            .enumerate()
            .filter(|(_, room)| {
                room.template
                    .and_then(|id| self.catalog.template(id))
                    .is_some_and(|t| t.has_style_for_usage(TileUsage::Entrance))
            })
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            warn!("No room can hold an entrance; skipping progression plan");
            return Ok(());
        }

        let pick = candidates[self.rng.gen_range(0..candidates.len())];
        let center = self.rooms[pick].center();
        let tile = self.grid.tile_mut(center)?;
        tile.kind = TileKind::Entrance;
        self.entrance = Some(Location {
            position: center,
            elevation: tile.z,
        });
        Ok(())
    }

    /// Walks the sector graph and plans one key per visited sector.
    pub(super) fn plan_progression(&mut self, graph: &SectorGraph) -> UndercroftResult<()> {
        let Some(entrance) = self.entrance else {
            return Ok(());
        };
        let start = self.grid.tile(entrance.position).sector_id;

        let mut remaining: BTreeSet<u32> = self.sector_colors.keys().copied().collect();
        remaining.remove(&start);
        let mut visited = BTreeSet::from([start]);
        let mut stack: Vec<u32> = Vec::new();
        let mut current = start;
        self.order_of_visitation.push(start);
        debug!("Progression starts in sector {}", start);

        while !remaining.is_empty() {
            let candidates: Vec<u32> = graph
                .neighbors(current)
                .iter()
                .copied()
                .filter(|s| remaining.contains(s))
                .collect();

            let next = if !candidates.is_empty() {
                let pick = candidates[self.rng.gen_range(0..candidates.len())];
                stack.push(current);
                self.place_key(pick, graph)?;
                pick
            } else if let Some(back) = stack.pop() {
                current = back;
                continue;
            } else {
                // The walk ran dry with sectors left over. Prefer one that
                // still borders the visited set so its lock stays meaningful.
                let adjacent: Vec<u32> = remaining
                    .iter()
                    .copied()
                    .filter(|s| graph.neighbors(*s).iter().any(|n| visited.contains(n)))
                    .collect();
                if !adjacent.is_empty() {
                    let pick = adjacent[self.rng.gen_range(0..adjacent.len())];
                    warn!("Progression dead end; jumping to bordering sector {}", pick);
                    self.place_key(pick, graph)?;
                    pick
                } else {
                    let all: Vec<u32> = remaining.iter().copied().collect();
                    let pick = all[self.rng.gen_range(0..all.len())];
                    warn!("Sector {} is unreachable from the entrance; no key planned", pick);
                    pick
                }
            };

            debug!("Visit sector {}", next);
            self.order_of_visitation.push(next);
            visited.insert(next);
            remaining.remove(&next);
            current = next;
        }
        Ok(())
    }

    /// Plants the key for `target` in the most recently visited sector,
    /// among the ten percent of its floor tiles farthest from the door that
    /// the key will unlock.
    fn place_key(&mut self, target: u32, graph: &SectorGraph) -> UndercroftResult<()> {
        let key_sector = self.order_of_visitation.last().copied().unwrap_or(target);
        let Some(&flank) = graph.door_flanks.get(&target) else {
            warn!("Sector {} has no door flank recorded; no key planned", target);
            return Ok(());
        };
        let Some(tiles) = self.tiles_by_sector.get(&key_sector) else {
            warn!("Sector {} has no floor tiles for a key", key_sector);
            return Ok(());
        };

        let mut by_distance = tiles.clone();
        by_distance.sort_by_key(|pos| Reverse(pos.manhattan_distance(flank)));
        let span = (by_distance.len() / 10 + 1).min(by_distance.len());
        let pos = by_distance[self.rng.gen_range(0..span)];

        let tile = self.grid.tile_mut(pos)?;
        tile.block_object_spawn = true;
        let elevation = tile.z + 0.5;

        let style = self.key_styles[self.rng.gen_range(0..self.key_styles.len())]
            .name
            .clone();
        debug!("Key to sector {} planned in sector {}", target, key_sector);
        self.keys_to_spawn.insert(
            target,
            Key {
                target_sector: target,
                style,
                color: self.color_for_sector(target),
                location: Location {
                    position: pos,
                    elevation,
                },
            },
        );
        Ok(())
    }

    /// Marks the exit: the latest-visited sector whose room can hold one,
    /// falling back to the first visited sector.
    pub(super) fn place_exit(&mut self) -> UndercroftResult<()> {
        let order = self.order_of_visitation.clone();
        if order.is_empty() {
            warn!("No visitation order; skipping exit placement");
            return Ok(());
        }

        for &sector in order.iter().rev() {
            let can_exit = self
                .room_by_sector(sector)
                .and_then(|i| self.rooms[i].template)
                .and_then(|id| self.catalog.template(id))
                .is_some_and(|t| t.has_style_for_usage(TileUsage::Exit));
            if can_exit && self.mark_exit(sector)? {
                return Ok(());
            }
        }

        warn!("No room can hold an exit; placing it in the entrance sector");
        self.mark_exit(order[0])?;
        Ok(())
    }

    fn mark_exit(&mut self, sector: u32) -> UndercroftResult<bool> {
        let Some(tiles) = self.tiles_by_sector.get(&sector) else {
            return Ok(false);
        };
        if tiles.is_empty() {
            return Ok(false);
        }
        let pos = tiles[self.rng.gen_range(0..tiles.len())];
        let tile = self.grid.tile_mut(pos)?;
        tile.kind = TileKind::Exit;
        self.exit = Some(Location {
            position: pos,
            elevation: tile.z,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogDef, Color, TemplateCatalog};
    use crate::generator::GenerationParams;
    use crate::grid::Position;

    fn full_catalog() -> TemplateCatalog {
        let def: CatalogDef = serde_json::from_value(serde_json::json!({
            "styles": [
                {"name": "start_pad", "usage": "entrance"},
                {"name": "exit_hatch", "usage": "exit"},
                {"name": "oak_door", "usage": "door", "can_be_locked": true}
            ],
            "templates": [
                {"name": "chamber",
                 "styles": [
                    {"name": "start_pad"},
                    {"name": "exit_hatch"},
                    {"name": "oak_door"}
                 ]}
            ],
            "key_styles": [{"name": "Bone Key"}, {"name": "Rusty Key"}]
        }))
        .unwrap();
        def.build()
    }

    fn locked_params(seed: u64) -> GenerationParams {
        GenerationParams {
            door_chance: 1.0,
            lock_chance: 1.0,
            vertical_chance: 0.0,
            seed,
            ..GenerationParams::for_testing()
        }
    }

    #[test]
    fn test_entrance_and_exit_are_placed() {
        let mut gen = DungeonGenerator::new(locked_params(5), full_catalog());
        gen.generate().unwrap();

        let entrance = gen.entrance_location().expect("entrance placed");
        let exit = gen.exit_location().expect("exit placed");
        assert_eq!(gen.grid().tile(entrance.position).kind, TileKind::Entrance);
        assert_eq!(gen.grid().tile(exit.position).kind, TileKind::Exit);
    }

    #[test]
    fn test_visitation_starts_at_entrance_sector() {
        let mut gen = DungeonGenerator::new(locked_params(9), full_catalog());
        gen.generate().unwrap();

        let entrance = gen.entrance_location().unwrap();
        let start = gen.grid().tile(entrance.position).sector_id;
        assert_eq!(gen.visitation_order().first(), Some(&start));
    }

    #[test]
    fn test_each_visited_sector_gets_one_key() {
        let mut gen = DungeonGenerator::new(locked_params(13), full_catalog());
        gen.generate().unwrap();

        let order = gen.visitation_order();
        // one key per sector past the entrance sector
        for &sector in &order[1..] {
            let key = gen.planned_keys().get(&sector).expect("key planned");
            assert_eq!(key.target_sector, sector);
            // the key waits in a strictly earlier sector
            let key_sector = gen.grid().tile(key.location.position).sector_id;
            let key_pos = order.iter().position(|&s| s == key_sector).unwrap();
            let target_pos = order.iter().position(|&s| s == sector).unwrap();
            assert!(key_pos < target_pos);
            assert!(gen.grid().tile(key.location.position).block_object_spawn);
        }
    }

    #[test]
    fn test_dead_end_walk_still_keys_bordering_sector() {
        let mut gen = DungeonGenerator::new(locked_params(3), TemplateCatalog::new());

        // Two sectors of floor plus a third the walk can never step into:
        // sector 3 lists 2 as its neighbor, but not the other way around.
        for (sector, y) in [(1u32, 2), (2u32, 4)] {
            for x in 2..7 {
                let pos = Position::new(x, y);
                let tile = gen.grid.tile_mut(pos).unwrap();
                tile.kind = TileKind::Floor;
                tile.sector_id = sector;
                gen.tiles_by_sector.entry(sector).or_default().push(pos);
            }
        }
        gen.entrance = Some(Location {
            position: Position::new(2, 2),
            elevation: 0.0,
        });
        for sector in 1..=3 {
            gen.sector_colors.insert(sector, Color::GREY);
        }

        let mut graph = SectorGraph::default();
        graph.adjacency.insert(1, vec![2]);
        graph.adjacency.insert(2, vec![1]);
        graph.adjacency.insert(3, vec![2]);
        graph.door_flanks.insert(2, Position::new(6, 3));
        graph.door_flanks.insert(3, Position::new(6, 5));

        gen.plan_progression(&graph).unwrap();

        // The walk backtracks to exhaustion, then jumps to the sector that
        // still borders visited ground, so its lock stays openable.
        assert_eq!(gen.order_of_visitation, vec![1, 2, 3]);
        let key = gen.keys_to_spawn.get(&3).expect("bordering sector keyed");
        assert_eq!(key.target_sector, 3);
        assert_eq!(gen.grid.tile(key.location.position).sector_id, 2);
    }

    #[test]
    fn test_no_entrance_skips_plan() {
        let mut gen = DungeonGenerator::new(locked_params(5), TemplateCatalog::new());
        gen.generate().unwrap();
        assert!(gen.entrance_location().is_none());
        assert!(gen.exit_location().is_none());
        assert!(gen.visitation_order().is_empty());
        assert!(gen.planned_keys().is_empty());
    }
}
