//! Sparse, persisted overrides for cells touched by play.

use std::{collections::BTreeMap, rc::Rc};

use tracing::{debug, warn};
use world_of_bits_core::{CellCoord, Document, Exponent, OverlayRecord};

use crate::{
    storage::{DocumentSlot, Durability, Storage},
    DocumentError,
};

/// Memento of every cell whose content deviates from generation.
///
/// Only `get`, `set` and `reset` touch the records; the backing container is
/// never handed out.
#[derive(Debug)]
pub struct OverlayStore {
    records: BTreeMap<CellCoord, OverlayRecord>,
    slot: DocumentSlot,
}

impl OverlayStore {
    /// Creates an empty store that is never persisted.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            records: BTreeMap::new(),
            slot: DocumentSlot::detached(Document::Board),
        }
    }

    /// Creates a store hydrated from the medium.
    ///
    /// A malformed document, or one holding exponents above `max_exponent`,
    /// is discarded with a warning.
    #[must_use]
    pub fn hydrate(storage: Rc<dyn Storage>, max_exponent: Exponent) -> Self {
        let slot = DocumentSlot::attached(storage, Document::Board);
        let records = match slot.load() {
            Some(contents) => match parse_board(&contents, max_exponent) {
                Ok(records) => {
                    debug!(records = records.len(), "hydrated board overlay");
                    records
                }
                Err(error) => {
                    warn!(
                        document = slot.document().name(),
                        %error,
                        "ignoring malformed board document"
                    );
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };
        Self { records, slot }
    }

    /// Creates a store from validated records and persists them.
    pub(crate) fn restore(
        storage: Rc<dyn Storage>,
        records: BTreeMap<CellCoord, OverlayRecord>,
    ) -> (Self, Durability) {
        let store = Self {
            records,
            slot: DocumentSlot::attached(storage, Document::Board),
        };
        let durability = store.persist();
        (store, durability)
    }

    /// Override recorded for the cell, if any.
    #[must_use]
    pub fn get(&self, cell: CellCoord) -> Option<OverlayRecord> {
        self.records.get(&cell).copied()
    }

    /// Upserts an override and writes the document.
    pub fn set(&mut self, cell: CellCoord, record: OverlayRecord) -> Durability {
        let _ = self.records.insert(cell, record);
        self.persist()
    }

    /// Drops every override and removes the document.
    pub fn reset(&mut self) -> Durability {
        self.records.clear();
        self.slot.discard()
    }

    /// Number of cells carrying an override.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Reports whether no cell carries an override.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialised board document: `{ "i:j": {hasToken?, exponent?}, ... }`.
    #[must_use]
    pub fn to_document(&self) -> String {
        serde_json::to_string(&self.records).expect("board document serialization never fails")
    }

    fn persist(&self) -> Durability {
        self.slot.save(&self.records)
    }
}

pub(crate) fn parse_board(
    contents: &str,
    max_exponent: Exponent,
) -> Result<BTreeMap<CellCoord, OverlayRecord>, DocumentError> {
    let records: BTreeMap<CellCoord, OverlayRecord> =
        serde_json::from_str(contents).map_err(|source| DocumentError::Malformed {
            document: Document::Board,
            source,
        })?;

    for (cell, record) in &records {
        if let OverlayRecord::Present(exponent) = record {
            if *exponent > max_exponent {
                return Err(DocumentError::ExponentOutOfRange {
                    document: Document::Board,
                    cell: *cell,
                    exponent: *exponent,
                });
            }
        }
    }
    Ok(records)
}
