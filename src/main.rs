//! Command-line front end: load a level spec, generate floors, and print the
//! ASCII rendering.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use undercroft::{DungeonGenerator, LevelSpec, UndercroftResult};

#[derive(Parser, Debug)]
#[command(name = "undercroft", version, about = "Rule-driven dungeon layout generator")]
struct Args {
    /// Level spec JSON (generation parameters plus template catalog).
    /// Defaults to a bare layout with no catalog.
    spec: Option<PathBuf>,

    /// Override the spec's seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the grid width
    #[arg(long)]
    width: Option<i32>,

    /// Override the grid height
    #[arg(long)]
    height: Option<i32>,

    /// Number of consecutive floors to generate
    #[arg(long, default_value_t = 1)]
    floors: u32,

    /// Print sector and progression debug info after each floor
    #[arg(long)]
    sectors: bool,
}

fn main() -> UndercroftResult<()> {
    env_logger::init();
    let args = Args::parse();

    let mut spec: LevelSpec = match &args.spec {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => LevelSpec::default(),
    };
    if let Some(seed) = args.seed {
        spec.params.seed = seed;
    }
    if let Some(width) = args.width {
        spec.params.width = width;
    }
    if let Some(height) = args.height {
        spec.params.height = height;
    }

    let mut generator = DungeonGenerator::from_spec(&spec);
    for _ in 0..args.floors {
        generator.generate()?;
        println!("{}", generator.floor_name());
        print!("{}", generator.to_text());

        if args.sectors {
            println!("Visitation order: {:?}", generator.visitation_order());
            for (sector, key) in generator.planned_keys() {
                println!(
                    "Key '{}' to sector {} at ({}, {})",
                    key.style, sector, key.location.position.x, key.location.position.y
                );
            }
            if let Some(entrance) = generator.entrance_location() {
                println!(
                    "Entrance at ({}, {})",
                    entrance.position.x, entrance.position.y
                );
            }
            if let Some(exit) = generator.exit_location() {
                println!("Exit at ({}, {})", exit.position.x, exit.position.y);
            }
        }
    }
    Ok(())
}
