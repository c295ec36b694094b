//! Content resolution and entity emission.
//!
//! `generate_spawn_data` resolves a style and optionally an object for every
//! tile, room by room over shuffled tiles so claim budgets are not spent in
//! scan order. `spawn_entities` then turns the resolved layout into
//! [`SpawnRequest`] values pushed into a caller-provided [`WorldSink`]; the
//! engine never constructs entities itself.
//!
//! Doors are resolved before keys are emitted: a locked door whose style
//! cannot hold a lock destroys its now-orphaned key, and emitting keys after
//! that pruning keeps unusable keys out of the world.

use super::DungeonGenerator;
use crate::catalog::{Color, ObjectKind};
use crate::grid::{Position, TileKind};
use crate::rules::RuleContext;
use crate::UndercroftResult;
use log::{debug, warn};
use rand::seq::SliceRandom;

/// A resolved door, ready for the entity system.
#[derive(Debug, Clone, PartialEq)]
pub struct DoorPlacement {
    pub style: String,
    pub position: Position,
    pub elevation: f32,
    pub orientation: f32,
    pub locked: bool,
    /// Sector whose key opens this door.
    pub sector: u32,
    /// Display name of that key; `None` for unlocked or keyless doors.
    pub key_name: Option<String>,
    pub color: Option<Color>,
}

/// One entity-creation request. Requests for an object attachment chain
/// arrive consecutively, parent first, sharing the tile position.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnRequest {
    /// World geometry for one tile.
    Tile {
        style: String,
        position: Position,
        elevation: f32,
        orientation: f32,
    },
    Prop {
        name: String,
        position: Position,
        elevation: f32,
        offset: [f32; 3],
        dynamic: bool,
    },
    Pickup {
        item: String,
        position: Position,
        elevation: f32,
        offset: [f32; 3],
    },
    Light {
        color: Color,
        intensity: f32,
        radius: f32,
        falloff: f32,
        position: Position,
        elevation: f32,
        offset: [f32; 3],
    },
    Enemy {
        kind: String,
        position: Position,
        elevation: f32,
        offset: [f32; 3],
    },
    Key {
        name: String,
        target_sector: u32,
        color: Color,
        position: Position,
        elevation: f32,
    },
    Door(DoorPlacement),
}

/// Receives entity-creation requests from [`DungeonGenerator::spawn_entities`].
pub trait WorldSink {
    fn add_entity(&mut self, request: SpawnRequest);
}

impl DungeonGenerator {
    /// Resolves styles and objects for every tile of every room.
    pub(super) fn generate_spawn_data(&mut self) -> UndercroftResult<()> {
        for room_index in 0..self.rooms.len() {
            let room = self.rooms[room_index].clone();
            if let Some(template) = room.template {
                // claim budgets are per room
                self.catalog.reset_template_useables(template);
            }

            let mut tiles: Vec<Position> = (room.y..room.y + room.height)
                .flat_map(|y| (room.x..room.x + room.width).map(move |x| Position::new(x, y)))
                .collect();
            tiles.shuffle(&mut self.rng);

            for pos in tiles {
                let tile = self.grid.tile(pos).clone();
                let choice = {
                    let ctx = RuleContext {
                        grid: &self.grid,
                        rooms: &self.rooms,
                        catalog: &self.catalog,
                        depth: self.depth,
                    };
                    self.catalog.find_style(tile.template, &tile, &ctx, &mut self.rng)
                };
                if let Some(choice) = choice {
                    if let Some(template) = tile.template {
                        self.catalog.commit_style(template, choice);
                    }
                    self.grid.tile_mut(pos)?.style = Some(choice.style);
                }

                if tile.block_object_spawn {
                    continue;
                }
                let tile = self.grid.tile(pos).clone();
                let choice = {
                    let ctx = RuleContext {
                        grid: &self.grid,
                        rooms: &self.rooms,
                        catalog: &self.catalog,
                        depth: self.depth,
                    };
                    self.catalog.find_object(tile.template, &tile, &ctx, &mut self.rng)
                };
                if let Some(choice) = choice {
                    if let Some(template) = tile.template {
                        self.catalog.commit_object(template, choice);
                    }
                    self.grid.tile_mut(pos)?.object = Some(choice.object);
                }
            }
        }
        Ok(())
    }

    /// Emits every planned entity into `sink`: keys, tile geometry, objects,
    /// and doors. Consumes the pending key plan.
    pub fn spawn_entities(&mut self, sink: &mut dyn WorldSink) -> UndercroftResult<()> {
        let doors = self.resolve_doors()?;

        for key in self.keys_to_spawn.values() {
            sink.add_entity(SpawnRequest::Key {
                name: key.style.clone(),
                target_sector: key.target_sector,
                color: key.color,
                position: key.location.position,
                elevation: key.location.elevation,
            });
        }

        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let tile = self.grid.tile(Position::new(x, y)).clone();
                if let Some(style) = tile.style.and_then(|id| self.catalog.style(id)) {
                    sink.add_entity(SpawnRequest::Tile {
                        style: style.name.clone(),
                        position: tile.position,
                        elevation: tile.z,
                        orientation: tile.orientation_degrees(),
                    });
                }
                if let Some(object) = tile.object {
                    self.spawn_tile_object(sink, tile.position, object);
                }
            }
        }

        for door in doors {
            sink.add_entity(SpawnRequest::Door(door));
        }

        self.keys_to_spawn.clear();
        Ok(())
    }

    /// Resolves a concrete door style for every door frame and works out the
    /// lock assignments, pruning keys that lost their lock.
    fn resolve_doors(&mut self) -> UndercroftResult<Vec<DoorPlacement>> {
        let mut placements = Vec::new();
        for i in 0..self.doors.len() {
            let pos = self.doors[i];
            let tile = self.grid.tile(pos).clone();
            let mut probe = tile.clone();
            probe.kind = TileKind::Door;

            let choice = {
                let ctx = RuleContext {
                    grid: &self.grid,
                    rooms: &self.rooms,
                    catalog: &self.catalog,
                    depth: self.depth,
                };
                self.catalog.find_style(tile.template, &probe, &ctx, &mut self.rng)
            };
            // Rooms without a usable door style keep a bare frame.
            let Some(choice) = choice else {
                debug!("No door style resolved at ({}, {})", pos.x, pos.y);
                continue;
            };
            if let Some(template) = tile.template {
                self.catalog.commit_style(template, choice);
            }
            let Some(style) = self.catalog.style(choice.style).cloned() else {
                continue;
            };

            let mut placement = DoorPlacement {
                style: style.name.clone(),
                position: pos,
                elevation: tile.z,
                orientation: tile.orientation_degrees(),
                locked: false,
                sector: tile.sector_id,
                key_name: None,
                color: None,
            };

            if tile.locked {
                if let TileKind::DoorFrame(dir) = tile.kind {
                    let start = self.grid.tile(pos.step(dir, -1)).sector_id;
                    let end = self.grid.tile(pos.step(dir, 1)).sector_id;
                    // the side a key was planned for wins
                    let id = if self.keys_to_spawn.contains_key(&end) {
                        end
                    } else {
                        start
                    };

                    if !style.can_be_locked {
                        if style.force_locked {
                            placement.locked = true;
                        }
                        if self.keys_to_spawn.remove(&id).is_some() {
                            warn!(
                                "Door style '{}' cannot lock; destroying orphan key to {}",
                                style.name, id
                            );
                        }
                    } else {
                        placement.locked = true;
                        placement.key_name =
                            self.keys_to_spawn.get(&id).map(|k| k.style.clone());
                        placement.color = Some(self.color_for_sector(id));
                    }
                    placement.sector = id;
                    self.grid.tile_mut(pos)?.sector_id = id;
                }
            }
            placements.push(placement);
        }
        Ok(placements)
    }

    /// Emits one object and recurses through its attachment chain.
    fn spawn_tile_object(&mut self, sink: &mut dyn WorldSink, pos: Position, object_id: usize) {
        let Some(object) = self.catalog.object(object_id).cloned() else {
            return;
        };
        let elevation = self.grid.tile(pos).z;
        let offset = object.spawn_offset;

        let request = match &object.kind {
            ObjectKind::Static | ObjectKind::Dynamic => Some(SpawnRequest::Prop {
                name: object.name.clone(),
                position: pos,
                elevation,
                offset,
                dynamic: object.kind == ObjectKind::Dynamic,
            }),
            ObjectKind::Pickup(item) => Some(SpawnRequest::Pickup {
                item: item.clone(),
                position: pos,
                elevation,
                offset,
            }),
            ObjectKind::Light {
                color,
                intensity,
                radius,
                falloff,
            } => Some(SpawnRequest::Light {
                color: *color,
                intensity: *intensity,
                radius: *radius,
                falloff: *falloff,
                position: pos,
                elevation,
                offset,
            }),
            ObjectKind::Enemy(kind) => Some(SpawnRequest::Enemy {
                kind: kind.clone(),
                position: pos,
                elevation,
                offset,
            }),
            ObjectKind::Spawner(spawns) => {
                let weights: Vec<f32> = spawns.iter().map(|(_, w)| *w).collect();
                match self.weighted_pick(&weights) {
                    Some(index) => Some(SpawnRequest::Enemy {
                        kind: spawns[index].0.clone(),
                        position: pos,
                        elevation,
                        offset,
                    }),
                    None => {
                        warn!("Spawner '{}' has an empty spawn list", object.name);
                        None
                    }
                }
            }
        };

        if let Some(request) = request {
            sink.add_entity(request);
        }
        if let Some(attachment) = object.attachment {
            self.spawn_tile_object(sink, pos, attachment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogDef, TemplateCatalog};
    use crate::generator::GenerationParams;

    #[derive(Default)]
    struct CollectingSink {
        requests: Vec<SpawnRequest>,
    }

    impl WorldSink for CollectingSink {
        fn add_entity(&mut self, request: SpawnRequest) {
            self.requests.push(request);
        }
    }

    fn catalog(door_can_lock: bool) -> TemplateCatalog {
        let def: CatalogDef = serde_json::from_value(serde_json::json!({
            "styles": [
                {"name": "start_pad", "usage": "entrance"},
                {"name": "stone_floor", "usage": "floor"},
                {"name": "oak_door", "usage": "door", "can_be_locked": door_can_lock}
            ],
            "objects": [
                {"name": "torch",
                 "kind": {"type": "light", "color": [1.0, 0.9, 0.6]},
                 "rules": [
                    {"type": "canSpawnOn", "usages": ["wall"]},
                    {"type": "maxCount", "max": 2}
                 ],
                 "attachment": {"name": "sconce", "kind": {"type": "static"}}}
            ],
            "templates": [
                {"name": "chamber",
                 "styles": [
                    {"name": "start_pad"},
                    {"name": "stone_floor"},
                    {"name": "oak_door"}
                 ],
                 "objects": [{"name": "torch"}]}
            ]
        }))
        .unwrap();
        def.build()
    }

    fn params(seed: u64) -> GenerationParams {
        GenerationParams {
            door_chance: 1.0,
            lock_chance: 1.0,
            vertical_chance: 0.0,
            seed,
            ..GenerationParams::for_testing()
        }
    }

    #[test]
    fn test_floor_tiles_resolve_styles() {
        let mut gen = DungeonGenerator::new(params(21), catalog(true));
        gen.generate().unwrap();
        let mut sink = CollectingSink::default();
        gen.spawn_entities(&mut sink).unwrap();

        let floor_tiles = sink
            .requests
            .iter()
            .filter(|r| matches!(r, SpawnRequest::Tile { style, .. } if style == "stone_floor"))
            .count();
        assert!(floor_tiles > 0);
    }

    #[test]
    fn test_locked_doors_carry_key_names() {
        let mut gen = DungeonGenerator::new(params(33), catalog(true));
        gen.generate().unwrap();
        let planned: Vec<u32> = gen.planned_keys().keys().copied().collect();
        let mut sink = CollectingSink::default();
        gen.spawn_entities(&mut sink).unwrap();

        let mut locked = 0;
        for request in &sink.requests {
            if let SpawnRequest::Door(door) = request {
                if door.locked {
                    locked += 1;
                    if planned.contains(&door.sector) {
                        assert!(door.key_name.is_some());
                        assert!(door.color.is_some());
                    }
                }
            }
        }
        assert!(locked > 0 || planned.is_empty());
    }

    #[test]
    fn test_unlockable_style_destroys_orphan_keys() {
        let mut gen = DungeonGenerator::new(params(33), catalog(false));
        gen.generate().unwrap();
        let mut sink = CollectingSink::default();
        gen.spawn_entities(&mut sink).unwrap();

        for request in &sink.requests {
            match request {
                SpawnRequest::Door(door) => assert!(!door.locked),
                SpawnRequest::Key { target_sector, .. } => {
                    // a surviving key's door was never resolved as a door
                    panic!("orphan key to sector {} was emitted", target_sector);
                }
                _ => {}
            }
        }
        assert!(gen.planned_keys().is_empty());
    }

    #[test]
    fn test_attachment_follows_parent() {
        let mut gen = DungeonGenerator::new(params(21), catalog(true));
        gen.generate().unwrap();
        let mut sink = CollectingSink::default();
        gen.spawn_entities(&mut sink).unwrap();

        for (i, request) in sink.requests.iter().enumerate() {
            if let SpawnRequest::Light { position, .. } = request {
                let Some(SpawnRequest::Prop { name, position: att_pos, .. }) =
                    sink.requests.get(i + 1)
                else {
                    panic!("light is missing its attachment");
                };
                assert_eq!(name, "sconce");
                assert_eq!(att_pos, position);
            }
        }
    }
}
