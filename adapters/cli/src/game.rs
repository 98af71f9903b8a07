//! Terminal session wiring the world, resolver and interaction engine together.

use std::{collections::BTreeMap, rc::Rc};

use anyhow::{bail, Context, Result};
use world_of_bits_core::{CellCoord, Command, Direction, Event, Outcome, TokenPresence, WorldPoint};
use world_of_bits_system_interaction::InteractionEngine;
use world_of_bits_system_resolver::CellResolver;
use world_of_bits_world::{self as world, query, GridConfig, Storage, World};

use crate::{position, save_transfer::SaveSnapshot, settings::Settings};

/// Result of a single interaction, with everything the world broadcast.
#[derive(Debug)]
pub(crate) struct Interaction {
    /// Outcome reported by the engine.
    pub outcome: Outcome,
    /// Events emitted while applying the outcome's commands.
    pub events: Vec<Event>,
}

/// One player's view of a persisted world.
#[derive(Debug)]
pub(crate) struct Game {
    grid: GridConfig,
    storage: Rc<dyn Storage>,
    world: World,
    resolver: CellResolver,
    engine: InteractionEngine,
    player: WorldPoint,
}

impl Game {
    /// Hydrates the world and player position from the medium.
    ///
    /// The rarity model's maximum exponent sets the world's win exponent.
    pub(crate) fn open(settings: Settings, storage: Rc<dyn Storage>) -> Self {
        let resolver = CellResolver::hashed(settings.resolver, settings.rarity);
        let world = World::with_storage(
            settings.grid,
            resolver.rarity().max_exponent(),
            Rc::clone(&storage),
        );
        let start = query::index(&world).cell_center(CellCoord::new(0, 0));
        let player = position::load(storage.as_ref(), start);
        Self {
            grid: settings.grid,
            resolver,
            engine: InteractionEngine::new(settings.interaction),
            storage,
            world,
            player,
        }
    }

    /// Cell the player currently stands in.
    pub(crate) fn player_cell(&self) -> CellCoord {
        query::index(&self.world).to_cell(self.player)
    }

    /// Renders the cells within `radius` of the player, north at the top.
    ///
    /// Tokens show their value, empty cells a dot; the player's cell is
    /// prefixed with `@`.
    pub(crate) fn look(&self, radius: u32) -> String {
        let index = query::index(&self.world);
        let player = self.player_cell();
        let centre = index.cell_center(player);
        let reach = f64::from(radius) * index.config().cell_size();
        let cells = index.cells_in_view(
            WorldPoint::new(centre.lat - reach, centre.lng - reach),
            WorldPoint::new(centre.lat + reach, centre.lng + reach),
        );

        let mut rows: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        for resolved in self.resolver.resolve_view(&self.world, &cells) {
            let glyph = match resolved.presence {
                TokenPresence::Empty => ".".to_owned(),
                TokenPresence::Token(exponent) => exponent.to_string(),
            };
            let glyph = if resolved.cell == player {
                format!("@{glyph}")
            } else {
                glyph
            };
            rows.entry(resolved.cell.i())
                .or_default()
                .push(format!("{glyph:>4}"));
        }

        rows.into_values()
            .rev()
            .map(|row| row.concat())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Summarises the session.
    pub(crate) fn status(&self) -> String {
        let view = query::session_view(&self.world);
        let holding = view.held_token.map_or_else(
            || "nothing".to_owned(),
            |token| format!("{} (from {})", token.exponent, token.cell),
        );
        [
            query::welcome_banner(&self.world).to_owned(),
            format!(
                "Position: {} ({:.6}, {:.6})",
                self.player_cell(),
                self.player.lat,
                self.player.lng
            ),
            format!("Holding: {holding}"),
            format!(
                "Goal: {} ({})",
                query::max_exponent(&self.world),
                if view.has_won { "reached" } else { "not reached" }
            ),
            format!(
                "Cells collected: {}, cells changed: {}",
                view.resolved_cells, view.overridden_cells
            ),
        ]
        .join("\n")
    }

    /// Walks the player `steps` cells in `direction`.
    pub(crate) fn walk(&mut self, direction: Direction, steps: u32) -> CellCoord {
        let index = query::index(&self.world);
        for _ in 0..steps {
            self.player = index.step(self.player, direction);
        }
        position::save(self.storage.as_ref(), self.player);
        self.player_cell()
    }

    /// Moves the player to an external position fix.
    pub(crate) fn teleport(&mut self, point: WorldPoint) -> Result<CellCoord> {
        if !point.lat.is_finite() || !point.lng.is_finite() {
            bail!("position {}, {} is not finite", point.lat, point.lng);
        }
        self.player = point;
        position::save(self.storage.as_ref(), self.player);
        Ok(self.player_cell())
    }

    /// Attempts an interaction with `cell` and applies its commands.
    pub(crate) fn interact(&mut self, cell: CellCoord) -> Interaction {
        let mut commands = Vec::new();
        let outcome = self.engine.attempt(
            &self.world,
            &self.resolver,
            self.player_cell(),
            cell,
            &mut commands,
        );
        Interaction {
            outcome,
            events: self.apply(commands),
        }
    }

    /// Clears every override and the session.
    pub(crate) fn reset(&mut self) -> Vec<Event> {
        self.apply(vec![Command::ResetGame])
    }

    /// Encodes both world documents as a save string.
    pub(crate) fn export(&self) -> String {
        SaveSnapshot::from(query::documents(&self.world)).encode()
    }

    /// Replaces the world with the documents carried by a save string.
    pub(crate) fn import(&mut self, save: &str) -> Result<()> {
        let snapshot = SaveSnapshot::decode(save).context("failed to decode save string")?;
        self.world = World::from_documents(
            self.grid,
            self.resolver.rarity().max_exponent(),
            Rc::clone(&self.storage),
            &snapshot.into(),
        )
        .context("save string holds invalid documents")?;
        Ok(())
    }

    fn apply(&mut self, commands: Vec<Command>) -> Vec<Event> {
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_of_bits_core::Exponent;
    use world_of_bits_world::FileStorage;

    fn open(directory: &std::path::Path) -> Game {
        let settings = Settings::load(None).expect("default settings");
        Game::open(settings, Rc::new(FileStorage::new(directory)))
    }

    #[test]
    fn win_exponent_follows_the_rarity_model() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = directory.path().join("settings.toml");
        std::fs::write(&config, "[game]\nmax_exponent = 6\n").expect("write settings");
        let settings = Settings::load(Some(&config)).expect("settings");

        let mut game = Game::open(settings, Rc::new(FileStorage::new(directory.path())));
        assert_eq!(query::max_exponent(&game.world), Exponent::new(6));
        assert_eq!(game.resolver.rarity().max_exponent(), Exponent::new(6));
        assert!(game.status().contains("Goal: 64 (not reached)"), "{}", game.status());

        let save = game.export();
        game.import(&save).expect("save imports");
        assert_eq!(query::max_exponent(&game.world), Exponent::new(6));
    }

    #[test]
    fn fresh_game_starts_at_origin_cell() {
        let directory = tempfile::tempdir().expect("temp dir");
        let game = open(directory.path());
        assert_eq!(game.player_cell(), CellCoord::new(0, 0));
        assert!(game.status().contains("Holding: nothing"));
    }

    #[test]
    fn look_renders_square_with_player_in_the_middle() {
        let directory = tempfile::tempdir().expect("temp dir");
        let game = open(directory.path());

        let view = game.look(2);
        let rows: Vec<&str> = view.lines().collect();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.len() == 20), "{view}");
        assert!(rows[2][8..12].trim_start().starts_with('@'), "{view}");
        assert_eq!(view.matches('@').count(), 1);
    }

    #[test]
    fn walking_moves_by_whole_cells_and_persists() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());

        assert_eq!(game.walk(Direction::North, 3), CellCoord::new(3, 0));
        assert_eq!(game.walk(Direction::West, 2), CellCoord::new(3, -2));

        let reopened = open(directory.path());
        assert_eq!(reopened.player_cell(), CellCoord::new(3, -2));
    }

    #[test]
    fn teleport_rejects_non_finite_positions() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());
        assert!(game.teleport(WorldPoint::new(f64::NAN, 0.0)).is_err());
        assert_eq!(game.player_cell(), CellCoord::new(0, 0));
    }

    #[test]
    fn far_cells_are_out_of_reach() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());

        let interaction = game.interact(CellCoord::new(40, 0));

        assert_eq!(
            interaction.outcome,
            Outcome::TooFar {
                distance: 40,
                radius: 6
            }
        );
        assert!(interaction.events.is_empty());
    }

    #[test]
    fn collecting_survives_restart_and_export() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());
        let target = query::index(&game.world)
            .cells_within(CellCoord::new(0, 0), 6)
            .into_iter()
            .find(|cell| game.resolver.resolve(&game.world, *cell) != TokenPresence::Empty)
            .expect("a token spawns within reach of the origin");

        let interaction = game.interact(target);
        assert!(matches!(interaction.outcome, Outcome::Collected { .. }));
        let save = game.export();

        let reopened = open(directory.path());
        assert_eq!(
            query::held_token(&reopened.world),
            query::held_token(&game.world)
        );

        let elsewhere = tempfile::tempdir().expect("temp dir");
        let mut imported = open(elsewhere.path());
        imported.import(&save).expect("save imports");
        assert_eq!(query::documents(&imported.world), query::documents(&game.world));
    }

    #[test]
    fn reset_clears_progress() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());
        game.import("bits:v1:eyJib2FyZFN0YXRlIjoie30iLCJnYW1lU3RhdGUiOiJ7XCJoYXNXb25cIjp0cnVlfSJ9")
            .expect("save imports");
        assert!(query::has_won(&game.world));

        let events = game.reset();

        assert_eq!(events, vec![Event::GameReset]);
        assert!(!query::has_won(&game.world));
    }

    #[test]
    fn invalid_saves_leave_the_world_alone() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut game = open(directory.path());
        let before = query::documents(&game.world);

        assert!(game.import("bits:v1:!!").is_err());
        assert!(game.import("hello").is_err());
        assert_eq!(query::documents(&game.world), before);
    }
}
