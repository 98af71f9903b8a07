//! Optional TOML settings file combining every system's configuration.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use world_of_bits_core::{Exponent, WorldPoint};
use world_of_bits_system_generation::RarityModel;
use world_of_bits_system_interaction::{Config as InteractionConfig, MergeMode};
use world_of_bits_system_resolver::{Config as ResolverConfig, DEFAULT_SPAWN_PROBABILITY};
use world_of_bits_world::{GridConfig, DEFAULT_CELL_SIZE, DEFAULT_ORIGIN};

const SUPPORTED_SETTINGS_VERSION: u32 = 1;
const DEFAULT_MAX_EXPONENT: u32 = 4;

/// Validated configuration for one run of the adapter.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    /// Grid geometry.
    pub grid: GridConfig,
    /// Rarity model; its maximum exponent is also the win exponent.
    pub rarity: RarityModel,
    /// Resolver configuration.
    pub resolver: ResolverConfig,
    /// Interaction configuration.
    pub interaction: InteractionConfig,
}

impl Settings {
    /// Loads settings from `path`, or the defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::from_file(SettingsFile::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings at {}", path.display()))?;
        parse_settings(&contents)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    fn from_file(file: SettingsFile) -> Result<Self> {
        if file.version != SUPPORTED_SETTINGS_VERSION {
            bail!(
                "unsupported settings version {}; expected {}",
                file.version,
                SUPPORTED_SETTINGS_VERSION
            );
        }

        let origin = WorldPoint::new(file.grid.origin_lat, file.grid.origin_lng);
        let grid = GridConfig::new(origin, file.grid.cell_size).context("invalid [grid] section")?;
        let rarity = RarityModel::new(Exponent::new(file.game.max_exponent))
            .context("invalid [game] max_exponent")?;
        let resolver = ResolverConfig::new(file.game.spawn_probability)
            .context("invalid [game] spawn_probability")?;
        let interaction =
            InteractionConfig::new(file.game.proximity_radius, file.game.merge_mode);

        Ok(Self {
            grid,
            rarity,
            resolver,
            interaction,
        })
    }
}

fn parse_settings(contents: &str) -> Result<Settings> {
    let file: SettingsFile =
        toml::from_str(contents).context("failed to parse settings toml contents")?;
    Settings::from_file(file)
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    version: u32,
    grid: GridSection,
    game: GameSection,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: SUPPORTED_SETTINGS_VERSION,
            grid: GridSection::default(),
            game: GameSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GridSection {
    origin_lat: f64,
    origin_lng: f64,
    cell_size: f64,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            origin_lat: DEFAULT_ORIGIN.lat,
            origin_lng: DEFAULT_ORIGIN.lng,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GameSection {
    max_exponent: u32,
    spawn_probability: f64,
    proximity_radius: u32,
    merge_mode: MergeMode,
}

impl Default for GameSection {
    fn default() -> Self {
        let interaction = InteractionConfig::default();
        Self {
            max_exponent: DEFAULT_MAX_EXPONENT,
            spawn_probability: DEFAULT_SPAWN_PROBABILITY,
            proximity_radius: interaction.proximity_radius(),
            merge_mode: interaction.merge_mode(),
        }
    }
}
