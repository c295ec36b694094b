//! # Undercroft
//!
//! A rule-driven procedural dungeon layout engine with a lock-and-key
//! progression graph.
//!
//! ## Architecture Overview
//!
//! Generation is a pipeline over a single mutable session:
//!
//! - **Grid & Room Model**: the addressable 2D tile array and the transient
//!   room bookkeeping used while the layout grows
//! - **Rule Engine**: placement predicates evaluated against tiles; stateful
//!   rules track usage counts across one generation pass
//! - **Template Catalog**: room templates owning usage-bucketed style and
//!   object "useables", each guarded by its own rule set
//! - **Layout Generator**: grows the dungeon by placing rooms against
//!   existing walls and carving connections (floors, stairs, door frames)
//! - **Connectivity Analyzer**: flood-fills sectors treating locked doors as
//!   boundaries and derives the sector adjacency graph
//! - **Progression Planner**: walks the sector graph to produce a visitation
//!   order and a key/lock assignment that guarantees solvability
//! - **Content Spawner**: resolves per-tile styles/objects/doors/keys and
//!   emits creation requests to an external entity sink
//!
//! Generation is single-threaded and synchronous: one [`DungeonGenerator`]
//! session owns its grid, catalog, and PRNG, and one `generate()` call
//! produces one complete level before returning.

pub mod catalog;
pub mod generator;
pub mod grid;
pub mod rules;

pub use catalog::{
    CatalogDef, Color, KeyStyle, ObjectKind, RoomTemplate, TemplateCatalog, TileObject, TileStyle,
    Useable,
};
pub use generator::{
    DoorPlacement, DungeonGenerator, GenerationParams, Key, LevelSpec, Location, SpawnRequest,
    WorldSink,
};
pub use grid::{Direction, Position, Room, Tile, TileGrid, TileKind, TileUsage};
pub use rules::{DepthSpec, Rule, RuleContext, RuleSet, TargetMatcher};

/// Core error type for the Undercroft engine.
#[derive(thiserror::Error, Debug)]
pub enum UndercroftError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing error
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Attempted to write a tile outside the grid bounds
    #[error("Tile write out of bounds at ({x}, {y})")]
    OutOfBounds { x: i32, y: i32 },

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the Undercroft codebase.
pub type UndercroftResult<T> = Result<T, UndercroftError>;

/// Version information for the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
