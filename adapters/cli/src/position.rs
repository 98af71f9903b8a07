//! Player position persisted alongside the world documents.

use tracing::warn;
use world_of_bits_core::WorldPoint;
use world_of_bits_world::Storage;

/// Name of the document holding the player's last position.
pub(crate) const POSITION_DOCUMENT: &str = "playerPosition";

/// Reads the saved position, falling back when it is absent or unreadable.
pub(crate) fn load(storage: &dyn Storage, fallback: WorldPoint) -> WorldPoint {
    let contents = match storage.read(POSITION_DOCUMENT) {
        Ok(Some(contents)) => contents,
        Ok(None) => return fallback,
        Err(error) => {
            warn!(document = POSITION_DOCUMENT, %error, "failed to read player position");
            return fallback;
        }
    };
    match serde_json::from_str::<WorldPoint>(&contents) {
        Ok(point) if point.lat.is_finite() && point.lng.is_finite() => point,
        Ok(_) => {
            warn!(document = POSITION_DOCUMENT, "ignoring non-finite player position");
            fallback
        }
        Err(error) => {
            warn!(document = POSITION_DOCUMENT, %error, "ignoring malformed player position");
            fallback
        }
    }
}

/// Writes the position; failures only cost the position on the next run.
pub(crate) fn save(storage: &dyn Storage, point: WorldPoint) {
    let contents = serde_json::to_string(&point).expect("position serialization never fails");
    if let Err(error) = storage.write(POSITION_DOCUMENT, &contents) {
        warn!(document = POSITION_DOCUMENT, %error, "failed to save player position");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_of_bits_world::MemoryStorage;

    const FALLBACK: WorldPoint = WorldPoint::new(1.0, 2.0);

    #[test]
    fn saved_position_is_restored() {
        let storage = MemoryStorage::new();
        save(&storage, WorldPoint::new(36.5, -122.25));
        assert_eq!(load(&storage, FALLBACK), WorldPoint::new(36.5, -122.25));
    }

    #[test]
    fn absent_or_malformed_positions_fall_back() {
        let storage = MemoryStorage::new();
        assert_eq!(load(&storage, FALLBACK), FALLBACK);

        storage.insert_raw(POSITION_DOCUMENT, r#"{"lat":"north"}"#);
        assert_eq!(load(&storage, FALLBACK), FALLBACK);
    }

    #[test]
    fn unwritable_storage_keeps_going() {
        let storage = MemoryStorage::new();
        storage.set_writable(false);
        save(&storage, WorldPoint::new(3.0, 4.0));
        assert_eq!(load(&storage, FALLBACK), FALLBACK);
    }
}
