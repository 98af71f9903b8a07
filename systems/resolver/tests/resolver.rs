use std::{cell::Cell, rc::Rc};

use world_of_bits_core::{
    CellCoord, Command, Exponent, OverlayRecord, Purpose, Token, TokenPresence,
};
use world_of_bits_system_generation::{Generator, RarityModel};
use world_of_bits_system_resolver::{CellResolver, Config, ResolvedCell};
use world_of_bits_world::{self as world, query, GridConfig, MemoryStorage, World};

const MAX: Exponent = Exponent::new(4);

/// Generator that fails the test if it is ever consulted.
struct PanickingGenerator;

impl Generator for PanickingGenerator {
    fn draw(&self, cell_key: &str, purpose: Purpose) -> f64 {
        panic!("generator consulted for {cell_key} ({purpose:?})");
    }
}

/// Generator that counts draws and always spawns an exponent-zero token.
#[derive(Default)]
struct CountingGenerator {
    draws: Rc<Cell<u32>>,
}

impl Generator for CountingGenerator {
    fn draw(&self, _cell_key: &str, _purpose: Purpose) -> f64 {
        self.draws.set(self.draws.get() + 1);
        0.0
    }
}

fn rarity() -> RarityModel {
    RarityModel::new(MAX).expect("rarity")
}

fn hashed() -> CellResolver {
    CellResolver::hashed(Config::default(), rarity())
}

fn apply_all(world: &mut World, commands: &[Command]) {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, *command, &mut events);
    }
}

#[test]
fn untouched_cells_resolve_identically_on_repeat() {
    let world = World::new(GridConfig::default(), MAX);
    let resolver = hashed();
    let cells = query::index(&world).cells_within(CellCoord::new(0, 0), 12);

    let first = resolver.resolve_view(&world, &cells);
    let second = resolver.resolve_view(&world, &cells);

    assert_eq!(first, second);
    assert_eq!(first.len(), 25 * 25);
}

#[test]
fn resolution_does_not_write_overrides() {
    let storage = Rc::new(MemoryStorage::new());
    let world = World::with_storage(GridConfig::default(), MAX, storage.clone());
    let resolver = hashed();
    let cells = query::index(&world).cells_within(CellCoord::new(40, -40), 10);

    let resolved = resolver.resolve_view(&world, &cells);

    assert!(resolved
        .iter()
        .any(|cell| matches!(cell.presence, TokenPresence::Token(_))));
    assert_eq!(query::session_view(&world).overridden_cells, 0);
    assert_eq!(storage.raw("boardState"), None);
}

#[test]
fn separate_resolvers_agree_on_generated_content() {
    let world = World::new(GridConfig::default(), MAX);
    let cells = query::index(&world).cells_within(CellCoord::new(-7, 3), 6);

    assert_eq!(
        hashed().resolve_view(&world, &cells),
        hashed().resolve_view(&world, &cells)
    );
}

#[test]
fn generated_spawn_rate_tracks_configuration() {
    let world = World::new(GridConfig::default(), MAX);
    let resolver = hashed();
    let cells = query::index(&world).cells_within(CellCoord::new(0, 0), 50);

    let tokens = resolver
        .resolve_view(&world, &cells)
        .iter()
        .filter(|cell| cell.presence != TokenPresence::Empty)
        .count();

    // Roughly 0.069 for max exponent 4 and the default base probability.
    let rate = tokens as f64 / cells.len() as f64;
    assert!((0.04..0.10).contains(&rate), "spawn rate {rate}");
}

#[test]
fn overrides_are_authoritative_without_generation() {
    let mut world = World::new(GridConfig::default(), MAX);
    let present = CellCoord::new(6, -2);
    let suppressed = CellCoord::new(3, -2);
    apply_all(
        &mut world,
        &[
            Command::SetOverlay {
                cell: present,
                record: OverlayRecord::Present(Exponent::new(2)),
            },
            Command::SetOverlay {
                cell: suppressed,
                record: OverlayRecord::Suppressed,
            },
        ],
    );

    let resolver = CellResolver::new(Config::default(), rarity(), PanickingGenerator);

    assert_eq!(
        resolver.resolve(&world, present),
        TokenPresence::Token(Exponent::new(2))
    );
    assert_eq!(resolver.resolve(&world, suppressed), TokenPresence::Empty);
}

#[test]
fn resolved_cells_skip_overlay_and_generation() {
    let mut world = World::new(GridConfig::default(), MAX);
    let cell = CellCoord::new(1, 1);
    apply_all(
        &mut world,
        &[
            Command::SetOverlay {
                cell,
                record: OverlayRecord::Present(Exponent::new(3)),
            },
            Command::CollectToken {
                token: Token::new(cell, Exponent::new(1)),
            },
        ],
    );

    let resolver = CellResolver::new(Config::default(), rarity(), PanickingGenerator);

    assert_eq!(resolver.resolve(&world, cell), TokenPresence::Empty);
}

#[test]
fn generator_is_consulted_once_per_purpose_for_untouched_cells() {
    let world = World::new(GridConfig::default(), MAX);
    let generator = CountingGenerator::default();
    let draws = Rc::clone(&generator.draws);
    let resolver = CellResolver::new(Config::new(1.0).expect("config"), rarity(), generator);

    let cells = [CellCoord::new(0, 0), CellCoord::new(0, 1)];
    let resolved = resolver.resolve_view(&world, &cells);

    assert_eq!(
        resolved,
        vec![
            ResolvedCell {
                cell: cells[0],
                presence: TokenPresence::Token(Exponent::new(0)),
            },
            ResolvedCell {
                cell: cells[1],
                presence: TokenPresence::Token(Exponent::new(0)),
            },
        ]
    );
    assert_eq!(draws.get(), 4, "one value and one spawn draw per cell");
}

#[test]
fn reset_restores_generated_content() {
    let mut world = World::new(GridConfig::default(), MAX);
    let resolver = hashed();
    let cells = query::index(&world).cells_within(CellCoord::new(2, 2), 4);
    let before = resolver.resolve_view(&world, &cells);

    let mut commands = Vec::new();
    for cell in &cells {
        commands.push(Command::SetOverlay {
            cell: *cell,
            record: OverlayRecord::Present(Exponent::new(3)),
        });
    }
    commands.push(Command::CollectToken {
        token: Token::new(cells[0], Exponent::new(3)),
    });
    apply_all(&mut world, &commands);
    assert_ne!(resolver.resolve_view(&world, &cells), before);

    apply_all(&mut world, &[Command::ResetGame]);

    assert_eq!(resolver.resolve_view(&world, &cells), before);
}
