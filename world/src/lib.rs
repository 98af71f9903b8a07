#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for World of Bits.
//!
//! The world owns the grid index, the sparse overlay of touched cells and the
//! player's session. It changes only through [`apply`]; readers go through
//! [`query`].

mod index;
mod overlay;
mod session;
mod storage;

use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};
use world_of_bits_core::{CellCoord, Command, Document, Event, Exponent, WELCOME_BANNER};

pub use index::{
    CellBounds, GridConfig, GridConfigError, WorldIndex, DEFAULT_CELL_SIZE, DEFAULT_ORIGIN,
};
pub use overlay::OverlayStore;
pub use session::SessionState;
pub use storage::{Durability, FileStorage, MemoryStorage, Storage, StorageError};

/// Serialised form of both persisted documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Documents {
    /// Board overlay document (`boardState`).
    pub board: String,
    /// Session document (`gameState`).
    pub session: String,
}

/// Reasons a persisted document was rejected.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document is not valid JSON of the expected shape.
    #[error("{} document is malformed", .document.name())]
    Malformed {
        /// Document that failed to parse.
        document: Document,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A token exponent exceeds the configured maximum.
    #[error("{} document holds exponent {} at {cell}, above the maximum", .document.name(), .exponent.get())]
    ExponentOutOfRange {
        /// Document holding the offending token.
        document: Document,
        /// Cell the token belongs to.
        cell: CellCoord,
        /// Offending exponent.
        exponent: Exponent,
    },
}

/// Represents the authoritative World of Bits state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    index: WorldIndex,
    overlay: OverlayStore,
    session: SessionState,
    max_exponent: Exponent,
}

impl World {
    /// Creates a world that keeps its state in memory only.
    #[must_use]
    pub fn new(grid: GridConfig, max_exponent: Exponent) -> Self {
        Self {
            banner: WELCOME_BANNER,
            index: WorldIndex::new(grid),
            overlay: OverlayStore::detached(),
            session: SessionState::detached(max_exponent),
            max_exponent,
        }
    }

    /// Creates a world hydrated from, and persisting to, the provided medium.
    #[must_use]
    pub fn with_storage(grid: GridConfig, max_exponent: Exponent, storage: Rc<dyn Storage>) -> Self {
        Self {
            banner: WELCOME_BANNER,
            index: WorldIndex::new(grid),
            overlay: OverlayStore::hydrate(Rc::clone(&storage), max_exponent),
            session: SessionState::hydrate(storage, max_exponent),
            max_exponent,
        }
    }

    /// Replaces the medium's contents with the provided documents and loads them.
    ///
    /// Unlike hydration, malformed documents are reported instead of ignored
    /// and the medium is left untouched.
    pub fn from_documents(
        grid: GridConfig,
        max_exponent: Exponent,
        storage: Rc<dyn Storage>,
        documents: &Documents,
    ) -> Result<Self, DocumentError> {
        // Both documents are validated before either store writes.
        let records = overlay::parse_board(&documents.board, max_exponent)?;
        let document = session::parse_session(&documents.session, max_exponent)?;
        let (overlay, board_durability) = OverlayStore::restore(Rc::clone(&storage), records);
        let (session, session_durability) = SessionState::restore(storage, document, max_exponent);
        if board_durability.and(session_durability) == Durability::Volatile {
            warn!("imported documents are only held in memory");
        }
        Ok(Self {
            banner: WELCOME_BANNER,
            index: WorldIndex::new(grid),
            overlay,
            session,
            max_exponent,
        })
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetOverlay { cell, record } => {
            let durability = world.overlay.set(cell, record);
            out_events.push(Event::OverlayUpdated { cell, record });
            report(durability, Document::Board, out_events);
        }
        Command::CollectToken { token } => {
            let durability = world.session.collect(token, out_events);
            report(durability, Document::Session, out_events);
        }
        Command::MergeIntoHeld => {
            let durability = world.session.merge_into_held(out_events);
            report(durability, Document::Session, out_events);
        }
        Command::ReleaseHeld => {
            let durability = world.session.release_held(out_events);
            report(durability, Document::Session, out_events);
        }
        Command::ReopenCell { cell } => {
            let durability = world.session.reopen(cell, out_events);
            report(durability, Document::Session, out_events);
        }
        Command::ResetGame => {
            let board = world.overlay.reset();
            let session = world.session.reset();
            info!("game reset");
            out_events.push(Event::GameReset);
            report(board, Document::Board, out_events);
            report(session, Document::Session, out_events);
        }
    }
}

fn report(durability: Durability, document: Document, out_events: &mut Vec<Event>) {
    if durability == Durability::Volatile {
        out_events.push(Event::PersistenceFailed { document });
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use world_of_bits_core::{CellCoord, Exponent, OverlayRecord, Token};

    use super::{Documents, World, WorldIndex};

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Provides read-only access to the world's grid index.
    #[must_use]
    pub fn index(world: &World) -> &WorldIndex {
        &world.index
    }

    /// Exponent whose value wins the game.
    #[must_use]
    pub fn max_exponent(world: &World) -> Exponent {
        world.max_exponent
    }

    /// Override recorded for the cell, if any.
    #[must_use]
    pub fn overlay_record(world: &World, cell: CellCoord) -> Option<OverlayRecord> {
        world.overlay.get(cell)
    }

    /// Reports whether the cell was already resolved this session.
    #[must_use]
    pub fn is_resolved(world: &World, cell: CellCoord) -> bool {
        world.session.is_resolved(cell)
    }

    /// Token currently carried by the player.
    #[must_use]
    pub fn held_token(world: &World) -> Option<Token> {
        world.session.held_token()
    }

    /// Reports whether the session has been won.
    #[must_use]
    pub fn has_won(world: &World) -> bool {
        world.session.has_won()
    }

    /// Captures a summary of the session for presentation.
    #[must_use]
    pub fn session_view(world: &World) -> SessionView {
        SessionView {
            held_token: world.session.held_token(),
            resolved_cells: world.session.resolved_count(),
            overridden_cells: world.overlay.len(),
            has_won: world.session.has_won(),
        }
    }

    /// Serialises both persisted documents as they currently stand.
    #[must_use]
    pub fn documents(world: &World) -> Documents {
        Documents {
            board: world.overlay.to_document(),
            session: world.session.to_document(),
        }
    }

    /// Read-only summary of the player's session.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SessionView {
        /// Token currently carried by the player.
        pub held_token: Option<Token>,
        /// Number of cells resolved this session.
        pub resolved_cells: usize,
        /// Number of cells carrying an override.
        pub overridden_cells: usize,
        /// Indicates whether the win value was reached.
        pub has_won: bool,
    }
}
