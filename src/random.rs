//! Uniform Random Sampling
//!
//! Every modulation loop draws its targets and delays through [`RandomRange`].
//! Output is intentionally unseeded in normal use: the default source is
//! seeded from the wall clock. Tests seed explicitly.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Closed interval `[min, max]` used for every tunable range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
#[cfg_attr(feature = "wasm", tsify(into_wasm_abi, from_wasm_abi))]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends finite and `min <= max`
    pub fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Midpoint, used for deterministic defaults
    pub fn center(&self) -> f64 {
        (self.min + self.max) * 0.5
    }
}

/// Uniform sampler over closed ranges.
///
/// Generic over the underlying generator so tests can inject a seeded one.
#[derive(Debug, Clone)]
pub struct RandomRange<R = SmallRng> {
    rng: R,
}

impl RandomRange<SmallRng> {
    /// Create a sampler seeded from the current time.
    pub fn from_system_time() -> Self {
        Self::from_seed(time_seed())
    }

    /// Create a reproducible sampler.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }
}

impl Default for RandomRange<SmallRng> {
    fn default() -> Self {
        Self::from_system_time()
    }
}

impl<R: RngCore> RandomRange<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Sample uniformly from `[min, max]`.
    ///
    /// Reversed arguments are swapped rather than rejected, and an empty
    /// interval (`min == max`) returns `min`.
    #[inline]
    pub fn between(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if !(hi > lo) {
            return lo;
        }
        let value = lo + self.rng.gen::<f64>() * (hi - lo);
        value.clamp(lo, hi)
    }

    /// Sample uniformly from a [`Bounds`].
    #[inline]
    pub fn sample(&mut self, bounds: Bounds) -> f64 {
        self.between(bounds.min, bounds.max)
    }

    /// True with the given probability (0.0 to 1.0).
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    /// Fair coin flip.
    #[inline]
    pub fn coin(&mut self) -> bool {
        self.chance(0.5)
    }

    /// Uniform index into a collection of `len` items. `len` must be non-zero.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
fn time_seed() -> u64 {
    // SystemTime is unavailable on wasm32-unknown-unknown
    (js_sys::Date::now() * 1000.0) as u64 ^ 0x9e37_79b9_7f4a_7c15
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm")))]
fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
