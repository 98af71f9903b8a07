//! Single-line save strings carrying both persisted documents.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use world_of_bits_world::Documents;

const SNAPSHOT_DOMAIN: &str = "bits";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "bits:v1";
/// Delimiter used to separate the prefix, version and payload.
const FIELD_DELIMITER: char = ':';

/// Snapshot of the board overlay and session documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveSnapshot {
    /// Raw `boardState` document.
    pub board_state: String,
    /// Raw `gameState` document.
    pub game_state: String,
}

impl SaveSnapshot {
    /// Encodes the snapshot into a single-line string suitable for clipboard transfer.
    #[must_use]
    pub(crate) fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("save snapshot serialization never fails");
        let encoded = STANDARD_NO_PAD.encode(json);
        format!("{SNAPSHOT_HEADER}{FIELD_DELIMITER}{encoded}")
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, TransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TransferError::EmptyPayload);
        }

        let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
        let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
        let version = parts.next().ok_or(TransferError::MissingVersion)?;
        let payload = parts.next().ok_or(TransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(TransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(TransferError::UnsupportedVersion(version.to_owned()));
        }

        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(TransferError::InvalidEncoding)?;
        serde_json::from_slice(&bytes).map_err(TransferError::InvalidPayload)
    }
}

impl From<Documents> for SaveSnapshot {
    fn from(documents: Documents) -> Self {
        Self {
            board_state: documents.board,
            game_state: documents.session,
        }
    }
}

impl From<SaveSnapshot> for Documents {
    fn from(snapshot: SaveSnapshot) -> Self {
        Self {
            board: snapshot.board_state,
            session: snapshot.game_state,
        }
    }
}

/// Errors that can occur while decoding save transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("save string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("save string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("save string is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("save string is missing the payload")]
    MissingPayload,
    /// The string used an unexpected prefix segment.
    #[error("save prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    #[error("save version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode save payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload could not be deserialised.
    #[error("could not parse save payload")]
    InvalidPayload(#[source] serde_json::Error),
}
