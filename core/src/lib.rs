#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the World of Bits engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values so observers can
//! refresh. Systems query immutable views of the world and respond with
//! [`Outcome`] values plus new command batches.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to World of Bits.";

/// Largest exponent a token may carry; token values are stored as `u64`.
pub const EXPONENT_LIMIT: u32 = 62;

/// Separator placed between the two axes of a cell key.
const KEY_SEPARATOR: char = ':';

/// Location of a single grid cell relative to the world origin.
///
/// Serialises to its stable string key `"{i}:{j}"`, which keeps the type
/// usable as a JSON object key.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CellCoord {
    i: i32,
    j: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Row index of the cell (latitude axis).
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.i
    }

    /// Column index of the cell (longitude axis).
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.j
    }

    /// Renders the stable string key identifying the cell.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parses a cell key produced by [`CellCoord::key`].
    ///
    /// Only the exact rendering is accepted: `"+1:2"`, `"01:2"` or `" 1:2"`
    /// are rejected even though they name the same integers.
    pub fn parse_key(key: &str) -> Result<Self, CellKeyError> {
        let (i, j) = key
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| CellKeyError::MissingSeparator(key.to_owned()))?;
        let i = i
            .parse::<i32>()
            .map_err(|_| CellKeyError::InvalidAxis(key.to_owned()))?;
        let j = j
            .parse::<i32>()
            .map_err(|_| CellKeyError::InvalidAxis(key.to_owned()))?;

        let cell = Self::new(i, j);
        if cell.key() != key {
            return Err(CellKeyError::NonCanonical(key.to_owned()));
        }
        Ok(cell)
    }

    /// Computes the Chebyshev distance between two cells.
    ///
    /// This is the only metric used for proximity gating.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.i.abs_diff(other.i).max(self.j.abs_diff(other.j))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.i, self.j)
    }
}

impl FromStr for CellCoord {
    type Err = CellKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_key(value)
    }
}

impl From<CellCoord> for String {
    fn from(cell: CellCoord) -> Self {
        cell.key()
    }
}

impl TryFrom<String> for CellCoord {
    type Error = CellKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_key(&value)
    }
}

/// Reasons a cell key string could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CellKeyError {
    /// The key does not contain the `:` separator.
    #[error("cell key `{0}` is missing the ':' separator")]
    MissingSeparator(String),
    /// One of the axes is not a signed 32-bit integer.
    #[error("cell key `{0}` contains a non-integer axis")]
    InvalidAxis(String),
    /// The key names valid integers but is not in canonical form.
    #[error("cell key `{0}` is not in canonical `i:j` form")]
    NonCanonical(String),
}

/// Cardinal directions used when stepping the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward increasing latitude.
    North,
    /// Toward increasing longitude.
    East,
    /// Toward decreasing latitude.
    South,
    /// Toward decreasing longitude.
    West,
}

/// Continuous world position expressed in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl WorldPoint {
    /// Creates a new world position.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Power-of-two exponent carried by a token. The token's value is `2^exponent`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Exponent(u32);

impl Exponent {
    /// Creates a new exponent wrapper.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the raw exponent.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Displayed value of a token carrying this exponent.
    ///
    /// Saturates at `u64::MAX` for exponents beyond [`EXPONENT_LIMIT`].
    #[must_use]
    pub const fn value(&self) -> u64 {
        if self.0 > EXPONENT_LIMIT {
            u64::MAX
        } else {
            1 << self.0
        }
    }

    /// Exponent produced by merging two tokens of this exponent.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Token picked up from a cell and carried by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Cell the token was taken from.
    #[serde(rename = "cellKey")]
    pub cell: CellCoord,
    /// Exponent of the token's value.
    pub exponent: Exponent,
}

impl Token {
    /// Creates a new token descriptor.
    #[must_use]
    pub const fn new(cell: CellCoord, exponent: Exponent) -> Self {
        Self { cell, exponent }
    }
}

/// Play-driven deviation of a cell from its deterministic content.
///
/// A cell without a record is governed by generation alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OverlayEntry", into = "OverlayEntry")]
pub enum OverlayRecord {
    /// The cell has no token for the rest of the session.
    Suppressed,
    /// The cell holds a token with the given exponent.
    Present(Exponent),
}

/// Persisted shape of an [`OverlayRecord`]: `{hasToken?, exponent?}`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverlayEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_token: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exponent: Option<u32>,
}

impl From<OverlayRecord> for OverlayEntry {
    fn from(record: OverlayRecord) -> Self {
        match record {
            OverlayRecord::Suppressed => Self {
                has_token: Some(false),
                exponent: None,
            },
            OverlayRecord::Present(exponent) => Self {
                has_token: Some(true),
                exponent: Some(exponent.get()),
            },
        }
    }
}

impl TryFrom<OverlayEntry> for OverlayRecord {
    type Error = OverlayEntryError;

    fn try_from(entry: OverlayEntry) -> Result<Self, Self::Error> {
        match (entry.has_token, entry.exponent) {
            (Some(false), _) => Ok(Self::Suppressed),
            (Some(true) | None, Some(exponent)) => Ok(Self::Present(Exponent::new(exponent))),
            (Some(true), None) => Err(OverlayEntryError::MissingExponent),
            (None, None) => Err(OverlayEntryError::Empty),
        }
    }
}

/// Reasons a persisted overlay entry was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum OverlayEntryError {
    /// `hasToken` is true but no exponent was recorded.
    #[error("overlay entry claims a token but carries no exponent")]
    MissingExponent,
    /// Neither field was present.
    #[error("overlay entry is empty")]
    Empty,
}

/// Logical content of a cell as answered by the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenPresence {
    /// No token is present.
    Empty,
    /// A token with the given exponent is present.
    Token(Exponent),
}

impl TokenPresence {
    /// Exponent of the present token, if any.
    #[must_use]
    pub const fn exponent(&self) -> Option<Exponent> {
        match self {
            Self::Empty => None,
            Self::Token(exponent) => Some(*exponent),
        }
    }
}

/// Independent deterministic draws made for every cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Selects the exponent a spawned token would carry.
    Value,
    /// Decides whether a token spawns at all.
    Spawn,
}

impl Purpose {
    /// Tag mixed into the hash for this purpose.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Spawn => "spawn",
        }
    }
}

/// Persisted documents owned by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Document {
    /// Sparse overlay of touched cells.
    Board,
    /// Held token, resolved cells and win flag.
    Session,
}

impl Document {
    /// Fixed storage name of the document.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Board => "boardState",
            Self::Session => "gameState",
        }
    }
}

/// Result of a single interaction attempt against a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The session is already won; nothing may change.
    GameWonBlocked,
    /// The cell lies beyond the proximity radius.
    TooFar {
        /// Grid distance between the player and the cell.
        distance: u32,
        /// Configured proximity radius.
        radius: u32,
    },
    /// The hand is empty and the cell has nothing to collect.
    NoToken,
    /// The cell's token moved into the player's hand.
    Collected {
        /// Token now held.
        token: Token,
    },
    /// The held token merged into the cell's token, which doubled.
    Merged {
        /// Cell that now holds the merged token.
        cell: CellCoord,
        /// Exponent of the merged token.
        exponent: Exponent,
    },
    /// The cell's token merged into the held token, which doubled.
    MergedIntoHand {
        /// Exponent of the held token after the merge.
        exponent: Exponent,
    },
    /// The held token was set down on an empty cell.
    Parked {
        /// Token that now lies on the cell.
        token: Token,
    },
    /// The held token and the cell's token differ in value.
    MergeRejectDifferentValue {
        /// Exponent of the held token.
        held: Exponent,
        /// Exponent of the cell's token.
        target: Exponent,
    },
    /// Both tokens already carry the maximum exponent.
    MergeRejectMaxValue {
        /// The shared ceiling exponent.
        exponent: Exponent,
    },
}

impl Outcome {
    /// Reports whether the outcome was accompanied by world mutations.
    #[must_use]
    pub const fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Collected { .. }
                | Self::Merged { .. }
                | Self::MergedIntoHand { .. }
                | Self::Parked { .. }
        )
    }

    /// Transient feedback text shown to the player.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::GameWonBlocked => "You already won! Reset to play again.".to_owned(),
            Self::TooFar { distance, radius } => {
                format!("Too far away ({distance} cells, reach is {radius}).")
            }
            Self::NoToken => "Nothing to collect here.".to_owned(),
            Self::Collected { token } => {
                format!("Picked up a {} from {}.", token.exponent, token.cell)
            }
            Self::Merged { cell, exponent } => format!("Merged! {cell} now holds {exponent}."),
            Self::MergedIntoHand { exponent } => format!("Merged! You now hold {exponent}."),
            Self::Parked { token } => format!("Placed your {} at {}.", token.exponent, token.cell),
            Self::MergeRejectDifferentValue { held, target } => {
                format!("Can't merge {held} with {target}: values differ.")
            }
            Self::MergeRejectMaxValue { exponent } => {
                format!("{exponent} is already the highest value.")
            }
        }
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Writes an authoritative override for a cell.
    SetOverlay {
        /// Cell receiving the override.
        cell: CellCoord,
        /// Override to store.
        record: OverlayRecord,
    },
    /// Places a token in the player's hand and marks its cell resolved.
    CollectToken {
        /// Token being collected.
        token: Token,
    },
    /// Raises the held token's exponent by one.
    MergeIntoHeld,
    /// Empties the player's hand.
    ReleaseHeld,
    /// Clears the resolved mark of a cell so its override becomes visible again.
    ReopenCell {
        /// Cell to reopen.
        cell: CellCoord,
    },
    /// Clears every override and the whole session.
    ResetGame,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A cell override was written.
    OverlayUpdated {
        /// Cell whose override changed.
        cell: CellCoord,
        /// The stored override.
        record: OverlayRecord,
    },
    /// A token entered the player's hand.
    TokenCollected {
        /// Token now held.
        token: Token,
    },
    /// The held token doubled.
    HeldTokenMerged {
        /// Held token after the merge.
        token: Token,
    },
    /// The player's hand was emptied.
    HeldTokenReleased {
        /// Token that left the hand.
        token: Token,
    },
    /// A resolved cell was reopened.
    CellReopened {
        /// Cell that was reopened.
        cell: CellCoord,
    },
    /// The held token reached the win value.
    GameWon {
        /// Winning token.
        token: Token,
    },
    /// All overrides and session state were cleared.
    GameReset,
    /// A document could not be written; in-memory state stays authoritative.
    PersistenceFailed {
        /// Document whose write failed.
        document: Document,
    },
}

#[cfg(test)]
mod tests {
    use super::{CellCoord, CellKeyError, Exponent, OverlayRecord, Outcome, Token};
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn cell_key_renders_signed_axes() {
        assert_eq!(CellCoord::new(3, -2).key(), "3:-2");
        assert_eq!(CellCoord::new(-17, 0).key(), "-17:0");
    }

    #[test]
    fn parse_key_inverts_key() {
        for cell in [
            CellCoord::new(0, 0),
            CellCoord::new(3, -2),
            CellCoord::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(CellCoord::parse_key(&cell.key()), Ok(cell));
        }
    }

    #[test]
    fn parse_key_rejects_malformed_keys() {
        assert!(matches!(
            CellCoord::parse_key("12"),
            Err(CellKeyError::MissingSeparator(_))
        ));
        assert!(matches!(
            CellCoord::parse_key("1:2:3"),
            Err(CellKeyError::InvalidAxis(_))
        ));
        assert!(matches!(
            CellCoord::parse_key("a:2"),
            Err(CellKeyError::InvalidAxis(_))
        ));
        assert!(matches!(
            CellCoord::parse_key(" 1:2"),
            Err(CellKeyError::InvalidAxis(_))
        ));
        assert!(matches!(
            CellCoord::parse_key("+1:2"),
            Err(CellKeyError::NonCanonical(_))
        ));
        assert!(matches!(
            CellCoord::parse_key("01:2"),
            Err(CellKeyError::NonCanonical(_))
        ));
    }

    #[test]
    fn chebyshev_distance_takes_larger_axis() {
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.chebyshev_distance(CellCoord::new(3, -2)), 3);
        assert_eq!(CellCoord::new(5, -2).chebyshev_distance(CellCoord::new(6, -2)), 1);
        assert_eq!(CellCoord::new(-4, 7).chebyshev_distance(CellCoord::new(2, 1)), 6);
    }

    #[test]
    fn exponent_value_is_power_of_two() {
        assert_eq!(Exponent::new(0).value(), 1);
        assert_eq!(Exponent::new(4).value(), 16);
        assert_eq!(Exponent::new(4).next(), Exponent::new(5));
        assert_eq!(Exponent::new(80).value(), u64::MAX);
    }

    #[test]
    fn token_round_trips_through_bincode() {
        assert_round_trip(&Token::new(CellCoord::new(-3, 9), Exponent::new(2)));
    }

    #[test]
    fn token_serialises_with_cell_key() {
        let token = Token::new(CellCoord::new(3, -2), Exponent::new(1));
        let json = serde_json::to_string(&token).expect("serialize");
        assert_eq!(json, r#"{"cellKey":"3:-2","exponent":1}"#);
    }

    #[test]
    fn overlay_record_uses_has_token_shape() {
        let suppressed = serde_json::to_string(&OverlayRecord::Suppressed).expect("serialize");
        assert_eq!(suppressed, r#"{"hasToken":false}"#);
        let present =
            serde_json::to_string(&OverlayRecord::Present(Exponent::new(3))).expect("serialize");
        assert_eq!(present, r#"{"hasToken":true,"exponent":3}"#);
    }

    #[test]
    fn overlay_record_accepts_legacy_shapes() {
        let bare: OverlayRecord = serde_json::from_str(r#"{"exponent":2}"#).expect("deserialize");
        assert_eq!(bare, OverlayRecord::Present(Exponent::new(2)));
        let emptied: OverlayRecord =
            serde_json::from_str(r#"{"hasToken":false,"exponent":2}"#).expect("deserialize");
        assert_eq!(emptied, OverlayRecord::Suppressed);
    }

    #[test]
    fn overlay_record_rejects_unrepresentable_shapes() {
        assert!(serde_json::from_str::<OverlayRecord>(r#"{"hasToken":true}"#).is_err());
        assert!(serde_json::from_str::<OverlayRecord>("{}").is_err());
    }

    #[test]
    fn only_state_changing_outcomes_mutate() {
        let token = Token::new(CellCoord::new(0, 0), Exponent::new(1));
        assert!(Outcome::Collected { token }.mutates());
        assert!(Outcome::Parked { token }.mutates());
        assert!(!Outcome::GameWonBlocked.mutates());
        assert!(!Outcome::TooFar {
            distance: 9,
            radius: 6
        }
        .mutates());
        assert!(!Outcome::MergeRejectMaxValue {
            exponent: Exponent::new(4)
        }
        .mutates());
    }
}
