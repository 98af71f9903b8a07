#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Flyweight read path answering what each cell currently holds.
//!
//! Untouched cells are derived on demand from deterministic draws and are
//! never written back; only play-driven overrides live in the world.

use thiserror::Error;
use world_of_bits_core::{CellCoord, OverlayRecord, Purpose, TokenPresence};
use world_of_bits_system_generation::{Generator, HashGenerator, RarityModel};
use world_of_bits_world::{query, World};

/// Base spawn probability used when none is configured.
pub const DEFAULT_SPAWN_PROBABILITY: f64 = 0.1;

/// Configuration parameters required to construct the resolver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    spawn_probability: f64,
}

impl Config {
    /// Creates a configuration with the given base spawn probability.
    pub fn new(spawn_probability: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&spawn_probability) {
            return Err(ConfigError::SpawnProbabilityOutOfRange(spawn_probability));
        }
        Ok(Self { spawn_probability })
    }

    /// Probability that an exponent-zero token spawns in a cell.
    #[must_use]
    pub const fn spawn_probability(&self) -> f64 {
        self.spawn_probability
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spawn_probability: DEFAULT_SPAWN_PROBABILITY,
        }
    }
}

/// Reasons a resolver configuration was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The probability lies outside `[0, 1]` or is NaN.
    #[error("spawn probability must lie within [0, 1], got {0}")]
    SpawnProbabilityOutOfRange(f64),
}

/// Resolution of a single visible cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedCell {
    /// Cell that was resolved.
    pub cell: CellCoord,
    /// Content of the cell.
    pub presence: TokenPresence,
}

/// Combines generation, rarity and world overrides into cell content.
#[derive(Clone, Debug)]
pub struct CellResolver<G = HashGenerator> {
    generator: G,
    rarity: RarityModel,
    spawn_probability: f64,
}

impl CellResolver<HashGenerator> {
    /// Creates a resolver drawing from the SHA-256 generator.
    #[must_use]
    pub fn hashed(config: Config, rarity: RarityModel) -> Self {
        Self::new(config, rarity, HashGenerator)
    }
}

impl<G: Generator> CellResolver<G> {
    /// Creates a resolver drawing from the provided generator.
    #[must_use]
    pub fn new(config: Config, rarity: RarityModel, generator: G) -> Self {
        Self {
            generator,
            rarity,
            spawn_probability: config.spawn_probability,
        }
    }

    /// Rarity model used for generation.
    #[must_use]
    pub fn rarity(&self) -> &RarityModel {
        &self.rarity
    }

    /// Content of the cell given the world's current overrides.
    ///
    /// Resolved cells and overridden cells never reach the generator.
    #[must_use]
    pub fn resolve(&self, world: &World, cell: CellCoord) -> TokenPresence {
        if query::is_resolved(world, cell) {
            return TokenPresence::Empty;
        }
        match query::overlay_record(world, cell) {
            Some(OverlayRecord::Present(exponent)) => TokenPresence::Token(exponent),
            Some(OverlayRecord::Suppressed) => TokenPresence::Empty,
            None => self.generated(cell),
        }
    }

    /// Content the cell has before any play touches it.
    #[must_use]
    pub fn generated(&self, cell: CellCoord) -> TokenPresence {
        let key = cell.key();
        let exponent = self
            .rarity
            .exponent_for(self.generator.draw(&key, Purpose::Value));
        let threshold = self.rarity.spawn_threshold(exponent, self.spawn_probability);
        if self.generator.draw(&key, Purpose::Spawn) < threshold {
            TokenPresence::Token(exponent)
        } else {
            TokenPresence::Empty
        }
    }

    /// Resolves every cell supplied by a viewport, preserving order.
    #[must_use]
    pub fn resolve_view(&self, world: &World, cells: &[CellCoord]) -> Vec<ResolvedCell> {
        cells
            .iter()
            .map(|&cell| ResolvedCell {
                cell,
                presence: self.resolve(world, cell),
            })
            .collect()
    }
}
