#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interaction system deciding what a single click on a cell does.
//!
//! The engine never mutates the world itself. It reads the current state,
//! picks an [`Outcome`] and emits the commands that realise it; callers apply
//! the whole batch through `world::apply` before the next read.

use serde::{Deserialize, Serialize};
use tracing::debug;
use world_of_bits_core::{CellCoord, Command, Exponent, OverlayRecord, Outcome, Token, TokenPresence};
use world_of_bits_system_generation::Generator;
use world_of_bits_system_resolver::CellResolver;
use world_of_bits_world::{query, World};

/// Reach, in cells, used when none is configured.
pub const DEFAULT_PROXIMITY_RADIUS: u32 = 6;

/// Where the doubled token ends up after a successful merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// The held token is consumed into the target cell, which doubles.
    #[default]
    IntoCell,
    /// The target cell's token is consumed into the hand, which doubles.
    IntoHand,
}

/// Configuration parameters required to construct the interaction engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    proximity_radius: u32,
    merge_mode: MergeMode,
}

impl Config {
    /// Creates a new configuration using the provided reach and merge mode.
    #[must_use]
    pub const fn new(proximity_radius: u32, merge_mode: MergeMode) -> Self {
        Self {
            proximity_radius,
            merge_mode,
        }
    }

    /// Greatest grid distance at which a cell can be interacted with.
    #[must_use]
    pub const fn proximity_radius(&self) -> u32 {
        self.proximity_radius
    }

    /// Merge behaviour applied on matching values.
    #[must_use]
    pub const fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_RADIUS, MergeMode::IntoCell)
    }
}

/// Everything the transition function looks at for one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Situation {
    /// Whether the session has already been won.
    pub has_won: bool,
    /// Grid distance between the player and the target cell.
    pub distance: u32,
    /// Token carried by the player.
    pub held: Option<Token>,
    /// Target cell.
    pub cell: CellCoord,
    /// Resolved content of the target cell.
    pub presence: TokenPresence,
    /// Exponent at which tokens stop merging.
    pub max_exponent: Exponent,
}

/// Pure state machine mapping a click on a cell to an outcome and commands.
#[derive(Clone, Copy, Debug)]
pub struct InteractionEngine {
    proximity_radius: u32,
    merge_mode: MergeMode,
}

impl InteractionEngine {
    /// Creates an engine from its configuration.
    ///
    /// The merge ceiling is not part of the engine: each attempt takes it
    /// from the resolver's rarity model.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            proximity_radius: config.proximity_radius,
            merge_mode: config.merge_mode,
        }
    }

    /// Greatest grid distance at which a cell can be interacted with.
    #[must_use]
    pub const fn proximity_radius(&self) -> u32 {
        self.proximity_radius
    }

    /// Attempts an interaction by the player standing on `player` with `cell`.
    ///
    /// Commands are pushed onto `out` only for outcomes that mutate the world.
    pub fn attempt<G: Generator>(
        &self,
        world: &World,
        resolver: &CellResolver<G>,
        player: CellCoord,
        cell: CellCoord,
        out: &mut Vec<Command>,
    ) -> Outcome {
        let max_exponent = resolver.rarity().max_exponent();
        debug_assert_eq!(
            max_exponent,
            query::max_exponent(world),
            "world and rarity model disagree on the win exponent"
        );
        let has_won = query::has_won(world);
        let distance = query::index(world).grid_distance(player, cell);
        // Out-of-reach and won sessions never need the cell's content.
        let presence = if has_won || distance > self.proximity_radius {
            TokenPresence::Empty
        } else {
            resolver.resolve(world, cell)
        };

        let outcome = self.decide(
            &Situation {
                has_won,
                distance,
                held: query::held_token(world),
                cell,
                presence,
                max_exponent,
            },
            out,
        );
        debug!(%player, %cell, ?outcome, "interaction attempted");
        outcome
    }

    /// Transition function for a single attempt.
    pub fn decide(&self, situation: &Situation, out: &mut Vec<Command>) -> Outcome {
        if situation.has_won {
            return Outcome::GameWonBlocked;
        }
        if situation.distance > self.proximity_radius {
            return Outcome::TooFar {
                distance: situation.distance,
                radius: self.proximity_radius,
            };
        }

        let cell = situation.cell;
        match (situation.held, situation.presence) {
            (None, TokenPresence::Empty) => Outcome::NoToken,
            (None, TokenPresence::Token(exponent)) => {
                let token = Token::new(cell, exponent);
                out.push(Command::SetOverlay {
                    cell,
                    record: OverlayRecord::Suppressed,
                });
                out.push(Command::CollectToken { token });
                Outcome::Collected { token }
            }
            (Some(held), TokenPresence::Empty) => {
                out.push(Command::SetOverlay {
                    cell,
                    record: OverlayRecord::Present(held.exponent),
                });
                out.push(Command::ReopenCell { cell });
                out.push(Command::ReleaseHeld);
                Outcome::Parked {
                    token: Token::new(cell, held.exponent),
                }
            }
            (Some(held), TokenPresence::Token(target)) if held.exponent != target => {
                Outcome::MergeRejectDifferentValue {
                    held: held.exponent,
                    target,
                }
            }
            (Some(_), TokenPresence::Token(exponent)) if exponent >= situation.max_exponent => {
                Outcome::MergeRejectMaxValue { exponent }
            }
            (Some(_), TokenPresence::Token(exponent)) => self.merge(cell, exponent, out),
        }
    }

    fn merge(&self, cell: CellCoord, exponent: Exponent, out: &mut Vec<Command>) -> Outcome {
        let merged = exponent.next();
        match self.merge_mode {
            MergeMode::IntoCell => {
                out.push(Command::SetOverlay {
                    cell,
                    record: OverlayRecord::Present(merged),
                });
                out.push(Command::ReleaseHeld);
                Outcome::Merged {
                    cell,
                    exponent: merged,
                }
            }
            MergeMode::IntoHand => {
                out.push(Command::SetOverlay {
                    cell,
                    record: OverlayRecord::Suppressed,
                });
                out.push(Command::MergeIntoHeld);
                Outcome::MergedIntoHand { exponent: merged }
            }
        }
    }
}
