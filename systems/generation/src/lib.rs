#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic per-cell draws and the rarity model that turns them into tokens.

use sha2::{Digest, Sha256};
use thiserror::Error;
use world_of_bits_core::{Exponent, Purpose, EXPONENT_LIMIT};

/// Byte placed between the cell key and the purpose tag so `"1:2" + "value"`
/// never collides with another split of the same bytes.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Source of reproducible values in `[0, 1)` for a cell and purpose.
///
/// Implementations must be pure: the same inputs always yield the same value,
/// across processes and sessions.
pub trait Generator {
    /// Draws the value associated with `cell_key` for the given purpose.
    fn draw(&self, cell_key: &str, purpose: Purpose) -> f64;
}

impl<F> Generator for F
where
    F: Fn(&str, Purpose) -> f64,
{
    fn draw(&self, cell_key: &str, purpose: Purpose) -> f64 {
        self(cell_key, purpose)
    }
}

/// Generator hashing `(cell key, purpose)` with SHA-256.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HashGenerator;

impl Generator for HashGenerator {
    fn draw(&self, cell_key: &str, purpose: Purpose) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(cell_key.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(purpose.label().as_bytes());
        unit_interval(finalize(hasher))
    }
}

fn finalize(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

fn unit_interval(value: u64) -> f64 {
    const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
    ((value >> 11) as f64) * SCALE
}

/// Reasons a rarity model could not be built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RarityError {
    /// Token values past this exponent do not fit in a `u64`.
    #[error("max exponent {0} exceeds the supported limit of {EXPONENT_LIMIT}")]
    ExponentTooLarge(u32),
}

/// Compounding rarity of token exponents.
///
/// Exponent `e` is weighted `2^-e`. The weights are normalised into a
/// cumulative distribution for choosing a spawned token's exponent, and
/// reused relative to `e = 0` as a multiplier on the spawn probability.
#[derive(Clone, Debug, PartialEq)]
pub struct RarityModel {
    cumulative: Vec<f64>,
    multipliers: Vec<f64>,
}

impl RarityModel {
    /// Builds the model for exponents `0..=max_exponent`.
    pub fn new(max_exponent: Exponent) -> Result<Self, RarityError> {
        if max_exponent.get() > EXPONENT_LIMIT {
            return Err(RarityError::ExponentTooLarge(max_exponent.get()));
        }

        let weights: Vec<f64> = (0..=max_exponent.get())
            .map(|exponent| 0.5_f64.powi(exponent as i32))
            .collect();
        let total: f64 = weights.iter().sum();

        let mut running = 0.0;
        let mut cumulative: Vec<f64> = weights
            .iter()
            .map(|weight| {
                running += weight;
                running / total
            })
            .collect();
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        let multipliers = weights.iter().map(|weight| weight / weights[0]).collect();

        Ok(Self {
            cumulative,
            multipliers,
        })
    }

    /// Highest exponent the model can produce.
    #[must_use]
    pub fn max_exponent(&self) -> Exponent {
        Exponent::new(self.cumulative.len().saturating_sub(1) as u32)
    }

    /// Token value that wins the game, `2^max_exponent`.
    #[must_use]
    pub fn win_value(&self) -> u64 {
        self.max_exponent().value()
    }

    /// Cumulative distribution `F(e)` for `e` in `0..=max_exponent`.
    #[must_use]
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Smallest exponent `e` with `u < F(e)`.
    ///
    /// Values outside `[0, 1)` clamp to the ends of the range.
    #[must_use]
    pub fn exponent_for(&self, u: f64) -> Exponent {
        let index = self.cumulative.partition_point(|bound| *bound <= u);
        let last = self.cumulative.len().saturating_sub(1);
        Exponent::new(index.min(last) as u32)
    }

    /// Spawn multiplier `m(e) = 2^-e`; zero above the maximum exponent.
    #[must_use]
    pub fn spawn_multiplier(&self, exponent: Exponent) -> f64 {
        usize::try_from(exponent.get())
            .ok()
            .and_then(|index| self.multipliers.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Probability that a cell whose value draw picked `exponent` spawns a token.
    #[must_use]
    pub fn spawn_threshold(&self, exponent: Exponent, base_probability: f64) -> f64 {
        base_probability * self.spawn_multiplier(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model(max: u32) -> RarityModel {
        RarityModel::new(Exponent::new(max)).expect("valid max exponent")
    }

    #[test]
    fn hash_draws_are_stable() {
        let generator = HashGenerator;
        let first = generator.draw("3:-2", Purpose::Value);
        let second = generator.draw("3:-2", Purpose::Value);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn purposes_draw_independently() {
        let generator = HashGenerator;
        let differing = (0..64)
            .map(|i| format!("{i}:0"))
            .filter(|key| {
                generator.draw(key, Purpose::Value) != generator.draw(key, Purpose::Spawn)
            })
            .count();
        assert_eq!(differing, 64);
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        let generator = HashGenerator;
        assert_ne!(
            generator.draw("1:2v", Purpose::Value),
            generator.draw("1:2", Purpose::Value)
        );
    }

    #[test]
    fn closures_act_as_generators() {
        let scripted = |_: &str, purpose: Purpose| match purpose {
            Purpose::Value => 0.25,
            Purpose::Spawn => 0.75,
        };
        assert_eq!(scripted.draw("0:0", Purpose::Spawn), 0.75);
    }

    #[test]
    fn cumulative_distribution_matches_halving_weights() {
        let rarity = model(2);
        let expected = [4.0 / 7.0, 6.0 / 7.0, 1.0];
        for (actual, expected) in rarity.cumulative().iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-12, "{actual} != {expected}");
        }
        assert_eq!(rarity.cumulative().last(), Some(&1.0));
    }

    #[test]
    fn exponent_for_picks_first_bucket_above_draw() {
        let rarity = model(2);
        assert_eq!(rarity.exponent_for(0.0), Exponent::new(0));
        assert_eq!(rarity.exponent_for(0.5), Exponent::new(0));
        assert_eq!(rarity.exponent_for(4.0 / 7.0), Exponent::new(1));
        assert_eq!(rarity.exponent_for(0.9), Exponent::new(2));
        assert_eq!(rarity.exponent_for(1.5), Exponent::new(2));
    }

    #[test]
    fn zero_max_exponent_always_yields_zero() {
        let rarity = model(0);
        assert_eq!(rarity.exponent_for(0.999), Exponent::new(0));
        assert_eq!(rarity.win_value(), 1);
    }

    #[test]
    fn spawn_threshold_scales_geometrically() {
        let rarity = model(4);
        assert_eq!(rarity.spawn_threshold(Exponent::new(0), 0.1), 0.1);
        assert_eq!(rarity.spawn_threshold(Exponent::new(3), 0.8), 0.1);
        assert_eq!(rarity.spawn_threshold(Exponent::new(5), 0.8), 0.0);
        assert_eq!(rarity.win_value(), 16);
    }

    #[test]
    fn oversized_max_exponent_is_rejected() {
        assert_eq!(
            RarityModel::new(Exponent::new(EXPONENT_LIMIT + 1)),
            Err(RarityError::ExponentTooLarge(EXPONENT_LIMIT + 1))
        );
    }

    proptest! {
        #[test]
        fn prop_draws_are_deterministic_and_in_range(i in any::<i32>(), j in any::<i32>()) {
            let key = format!("{i}:{j}");
            for purpose in [Purpose::Value, Purpose::Spawn] {
                let first = HashGenerator.draw(&key, purpose);
                let second = HashGenerator.draw(&key, purpose);
                prop_assert_eq!(first.to_bits(), second.to_bits());
                prop_assert!((0.0..1.0).contains(&first));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_exponent_for_is_in_range_and_monotonic(
            max in 0u32..=EXPONENT_LIMIT,
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            let rarity = model(max);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low_exponent = rarity.exponent_for(low);
            let high_exponent = rarity.exponent_for(high);
            prop_assert!(high_exponent.get() <= max);
            prop_assert!(low_exponent <= high_exponent);
        }
    }
}
