//! Player-held token, resolved cells and the win flag.

use std::{collections::BTreeSet, rc::Rc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use world_of_bits_core::{CellCoord, Document, Event, Exponent, Token};

use crate::{
    storage::{DocumentSlot, Durability, Storage},
    DocumentError,
};

/// Persisted shape: `{heldToken, collectedKeys, hasWon}`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionDocument {
    #[serde(default)]
    held_token: Option<Token>,
    #[serde(default)]
    collected_keys: Vec<CellCoord>,
    #[serde(default)]
    has_won: bool,
}

/// Session-scoped progress of the player.
///
/// Every mutation persists the whole document and reports its durability;
/// observers learn about changes through the pushed [`Event`]s.
#[derive(Debug)]
pub struct SessionState {
    held: Option<Token>,
    collected: BTreeSet<CellCoord>,
    has_won: bool,
    win_exponent: Exponent,
    slot: DocumentSlot,
}

impl SessionState {
    /// Creates an empty session that is never persisted.
    #[must_use]
    pub fn detached(win_exponent: Exponent) -> Self {
        Self::from_document(
            SessionDocument::default(),
            win_exponent,
            DocumentSlot::detached(Document::Session),
        )
    }

    /// Creates a session hydrated from the medium.
    ///
    /// A malformed document, or one holding a token above `win_exponent`, is
    /// discarded with a warning.
    #[must_use]
    pub fn hydrate(storage: Rc<dyn Storage>, win_exponent: Exponent) -> Self {
        let slot = DocumentSlot::attached(storage, Document::Session);
        let document = match slot.load() {
            Some(contents) => parse_session(&contents, win_exponent).unwrap_or_else(|error| {
                warn!(
                    document = slot.document().name(),
                    %error,
                    "ignoring malformed session document"
                );
                SessionDocument::default()
            }),
            None => SessionDocument::default(),
        };
        Self::from_document(document, win_exponent, slot)
    }

    /// Creates a session from a validated document and persists it.
    pub(crate) fn restore(
        storage: Rc<dyn Storage>,
        document: SessionDocument,
        win_exponent: Exponent,
    ) -> (Self, Durability) {
        let session = Self::from_document(
            document,
            win_exponent,
            DocumentSlot::attached(storage, Document::Session),
        );
        let durability = session.persist();
        (session, durability)
    }

    fn from_document(
        document: SessionDocument,
        win_exponent: Exponent,
        slot: DocumentSlot,
    ) -> Self {
        let reached_win = document
            .held_token
            .map_or(false, |token| token.exponent == win_exponent);
        let session = Self {
            held: document.held_token,
            collected: document.collected_keys.into_iter().collect(),
            has_won: document.has_won || reached_win,
            win_exponent,
            slot,
        };
        debug!(
            held = ?session.held,
            collected = session.collected.len(),
            has_won = session.has_won,
            "session ready"
        );
        session
    }

    /// Reports whether the cell was already resolved this session.
    #[must_use]
    pub fn is_resolved(&self, cell: CellCoord) -> bool {
        self.collected.contains(&cell)
    }

    /// Token currently carried by the player.
    #[must_use]
    pub const fn held_token(&self) -> Option<Token> {
        self.held
    }

    /// Reports whether the win value was reached this session.
    #[must_use]
    pub const fn has_won(&self) -> bool {
        self.has_won
    }

    /// Number of cells resolved this session.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.collected.len()
    }

    /// Puts a token in the player's hand and marks its cell resolved.
    ///
    /// # Panics
    ///
    /// Panics if a token is already held.
    pub fn collect(&mut self, token: Token, out_events: &mut Vec<Event>) -> Durability {
        assert!(
            self.held.is_none(),
            "collect requires an empty hand, holding {:?}",
            self.held
        );
        self.held = Some(token);
        let _ = self.collected.insert(token.cell);
        out_events.push(Event::TokenCollected { token });
        self.evaluate_win(out_events);
        self.persist()
    }

    /// Doubles the held token in place.
    ///
    /// # Panics
    ///
    /// Panics if nothing is held or the held token already carries the win
    /// exponent.
    pub fn merge_into_held(&mut self, out_events: &mut Vec<Event>) -> Durability {
        let win_exponent = self.win_exponent;
        let Some(held) = self.held.as_mut() else {
            panic!("merge_into_held requires a held token");
        };
        assert!(
            held.exponent < win_exponent,
            "held token {held:?} cannot exceed exponent {win_exponent:?}"
        );
        held.exponent = held.exponent.next();
        out_events.push(Event::HeldTokenMerged { token: *held });
        self.evaluate_win(out_events);
        self.persist()
    }

    /// Empties the player's hand. Releasing an empty hand changes nothing.
    pub fn release_held(&mut self, out_events: &mut Vec<Event>) -> Durability {
        let Some(token) = self.held.take() else {
            return Durability::Persisted;
        };
        out_events.push(Event::HeldTokenReleased { token });
        self.persist()
    }

    /// Clears the resolved mark of a cell.
    pub fn reopen(&mut self, cell: CellCoord, out_events: &mut Vec<Event>) -> Durability {
        if !self.collected.remove(&cell) {
            return Durability::Persisted;
        }
        out_events.push(Event::CellReopened { cell });
        self.persist()
    }

    /// Forgets the held token, resolved cells and win flag, and removes the document.
    pub fn reset(&mut self) -> Durability {
        self.held = None;
        self.collected.clear();
        self.has_won = false;
        self.slot.discard()
    }

    /// Serialised session document.
    #[must_use]
    pub fn to_document(&self) -> String {
        serde_json::to_string(&self.snapshot()).expect("session document serialization never fails")
    }

    fn evaluate_win(&mut self, out_events: &mut Vec<Event>) {
        if self.has_won {
            return;
        }
        let Some(token) = self.held else {
            return;
        };
        if token.exponent == self.win_exponent {
            self.has_won = true;
            info!(value = token.exponent.value(), "win value reached");
            out_events.push(Event::GameWon { token });
        }
    }

    fn snapshot(&self) -> SessionDocument {
        SessionDocument {
            held_token: self.held,
            collected_keys: self.collected.iter().copied().collect(),
            has_won: self.has_won,
        }
    }

    fn persist(&self) -> Durability {
        self.slot.save(&self.snapshot())
    }
}

pub(crate) fn parse_session(
    contents: &str,
    win_exponent: Exponent,
) -> Result<SessionDocument, DocumentError> {
    let document: SessionDocument =
        serde_json::from_str(contents).map_err(|source| DocumentError::Malformed {
            document: Document::Session,
            source,
        })?;
    if let Some(token) = document.held_token {
        if token.exponent > win_exponent {
            return Err(DocumentError::ExponentOutOfRange {
                document: Document::Session,
                cell: token.cell,
                exponent: token.exponent,
            });
        }
    }
    Ok(document)
}
