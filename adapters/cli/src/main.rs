#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that lets a player walk the World of Bits grid.

mod game;
mod position;
mod save_transfer;
mod settings;

use std::{path::PathBuf, rc::Rc};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use world_of_bits_core::{CellCoord, Direction, Event, WorldPoint};
use world_of_bits_world::FileStorage;

use crate::{game::Game, settings::Settings};

/// Collect and merge power-of-two tokens scattered over a map grid.
#[derive(Debug, Parser)]
#[command(name = "world-of-bits", version)]
struct Args {
    /// Directory holding the persisted documents.
    #[arg(long, value_name = "DIR", default_value = ".world-of-bits")]
    state_dir: PathBuf,

    /// TOML settings file; every field falls back to its default.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Print the cells around the player.
    Look {
        /// Number of cells shown in each direction.
        #[arg(long, default_value_t = 6)]
        radius: u32,
    },
    /// Print the player's position, held token and progress.
    Status,
    /// Step the player across the grid.
    Move {
        /// Direction of travel.
        direction: Heading,
        /// Number of cells to walk.
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Place the player at a latitude and longitude.
    #[command(allow_negative_numbers = true)]
    Goto {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
    },
    /// Collect, merge or drop a token at the given `i:j` cell.
    Interact {
        /// Target cell key, for example `3:-2`.
        #[arg(allow_hyphen_values = true)]
        cell: CellCoord,
    },
    /// Clear every change to the map and the player's progress.
    Reset,
    /// Print a save string carrying the current progress.
    Export,
    /// Replace the current progress with a save string.
    Import {
        /// String produced by `export`.
        save: String,
    },
}

/// Cardinal direction accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Heading {
    North,
    East,
    South,
    West,
}

impl From<Heading> for Direction {
    fn from(heading: Heading) -> Self {
        match heading {
            Heading::North => Self::North,
            Heading::East => Self::East,
            Heading::South => Self::South,
            Heading::West => Self::West,
        }
    }
}

/// Entry point for the World of Bits command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let mut game = Game::open(settings, Rc::new(FileStorage::new(args.state_dir)));

    match args.action {
        Action::Look { radius } => println!("{}", game.look(radius)),
        Action::Status => println!("{}", game.status()),
        Action::Move { direction, steps } => {
            let cell = game.walk(direction.into(), steps);
            println!("You are now at {cell}.");
        }
        Action::Goto { lat, lng } => {
            let cell = game.teleport(WorldPoint::new(lat, lng))?;
            println!("You are now at {cell}.");
        }
        Action::Interact { cell } => {
            let interaction = game.interact(cell);
            println!("{}", interaction.outcome.message());
            for event in interaction.events {
                if let Event::GameWon { token } = event {
                    println!("You reached {}! You win.", token.exponent);
                }
            }
        }
        Action::Reset => {
            let _ = game.reset();
            println!("The map and your progress were reset.");
        }
        Action::Export => println!("{}", game.export()),
        Action::Import { save } => {
            game.import(&save)?;
            println!("Progress imported.");
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
