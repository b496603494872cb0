//! Modulation Settings
//!
//! [`ModulationConfig`] holds the user-facing bounds and toggles. The
//! settings collaborator replaces it wholesale on every change. The
//! [`ModulationTuning`] constants (ramp times, delay ranges, gain factors)
//! are engine-side defaults that a host may override.

use crate::error::ModulationError;
use crate::random::Bounds;
use serde::{Deserialize, Serialize};

/// User-controlled modulation bounds and enable flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
#[cfg_attr(feature = "wasm", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase", default)]
pub struct ModulationConfig {
    /// Lower bound of the filter sweep (Hz)
    pub filter_min: f64,
    /// Upper bound of the filter sweep (Hz)
    pub filter_max: f64,
    /// Shortest gating period (seconds)
    pub gating_min: f64,
    /// Longest gating period (seconds)
    pub gating_max: f64,
    /// Base output volume, 0 to 1
    pub volume: f64,
    pub enable_filter: bool,
    pub enable_gating: bool,
    pub enable_playback_rate: bool,
    pub enable_binaural_beat: bool,
    /// Request a random track when the current one ends
    pub shuffle: bool,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            filter_min: 200.0,
            filter_max: 2000.0,
            gating_min: 1.0,
            gating_max: 5.0,
            volume: 0.8,
            enable_filter: true,
            enable_gating: true,
            enable_playback_rate: true,
            enable_binaural_beat: true,
            shuffle: true,
        }
    }
}

impl ModulationConfig {
    pub fn filter_bounds(&self) -> Bounds {
        Bounds::new(self.filter_min, self.filter_max)
    }

    pub fn gating_bounds(&self) -> Bounds {
        Bounds::new(self.gating_min, self.gating_max)
    }

    /// Check the bounds invariants
    pub fn validate(&self) -> Result<(), ModulationError> {
        if !self.filter_bounds().is_ordered() {
            return Err(ModulationError::config(format!(
                "filterMin {} > filterMax {}",
                self.filter_min, self.filter_max
            )));
        }
        if self.filter_min <= 0.0 {
            return Err(ModulationError::config("filterMin must be positive"));
        }
        if !self.gating_bounds().is_ordered() {
            return Err(ModulationError::config(format!(
                "gatingMin {} > gatingMax {}",
                self.gating_min, self.gating_max
            )));
        }
        if self.gating_min <= 0.0 {
            return Err(ModulationError::config("gatingMin must be positive"));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ModulationError::config(format!(
                "volume {} outside [0, 1]",
                self.volume
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ModulationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a settings snapshot. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ModulationError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Engine-side constants for every loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationTuning {
    /// Ramp duration for filter and gain changes (seconds)
    pub ramp: f64,
    /// Delay between filter ticks (ms)
    pub filter_delay_ms: Bounds,
    /// Resonance range while sweeping
    pub filter_q: Bounds,
    /// Ramp duration for pan changes (seconds)
    pub panning_ramp: f64,
    /// Delay between panning ticks (ms)
    pub panning_delay_ms: Bounds,
    pub playback_rate: Bounds,
    /// Delay between playback-rate ticks (ms)
    pub playback_rate_delay_ms: Bounds,
    /// Gating never dips below this volume
    pub volume_floor: f64,
    /// Fraction of the gating period spent at the dipped volume
    pub gating_dwell: f64,
    /// Next gating cycle starts after this multiple of the period
    pub gating_cycle_multiplier: Bounds,
    /// Filter basis is divided by a value in this range to get the beat carrier
    pub beat_divisor: Bounds,
    /// Beat width (Hz) between the two tones, spanning delta to beta
    pub beat_width_hz: Bounds,
    /// Beat frequency ramps take `ramp * factor`
    pub beat_ramp_factor: Bounds,
    /// Beat gain is this factor times the current volume
    pub beat_gain: Bounds,
    /// Lowest frequency either oscillator may be sent to (Hz)
    pub min_oscillator_hz: f64,
}

impl Default for ModulationTuning {
    fn default() -> Self {
        Self {
            ramp: 0.15,
            filter_delay_ms: Bounds::new(900.0, 10_000.0),
            filter_q: Bounds::new(0.0, 1.0),
            panning_ramp: 0.45,
            panning_delay_ms: Bounds::new(600.0, 7000.0),
            playback_rate: Bounds::new(0.5, 1.5),
            playback_rate_delay_ms: Bounds::new(2000.0, 12_000.0),
            volume_floor: 0.1,
            gating_dwell: 0.5,
            gating_cycle_multiplier: Bounds::new(1.0, 2.0),
            beat_divisor: Bounds::new(3.0, 6.0),
            beat_width_hz: Bounds::new(0.5, 19.0),
            beat_ramp_factor: Bounds::new(0.7, 2.5),
            beat_gain: Bounds::new(0.004, 0.012),
            min_oscillator_hz: 1.0,
        }
    }
}

impl ModulationTuning {
    pub fn validate(&self) -> Result<(), ModulationError> {
        let ranges = [
            ("filter_delay_ms", self.filter_delay_ms),
            ("filter_q", self.filter_q),
            ("panning_delay_ms", self.panning_delay_ms),
            ("playback_rate", self.playback_rate),
            ("playback_rate_delay_ms", self.playback_rate_delay_ms),
            ("gating_cycle_multiplier", self.gating_cycle_multiplier),
            ("beat_divisor", self.beat_divisor),
            ("beat_width_hz", self.beat_width_hz),
            ("beat_ramp_factor", self.beat_ramp_factor),
            ("beat_gain", self.beat_gain),
        ];
        for (name, bounds) in ranges {
            if !bounds.is_ordered() {
                return Err(ModulationError::config(format!("{} min > max", name)));
            }
        }
        if self.beat_divisor.min <= 0.0 {
            return Err(ModulationError::config("beat_divisor must be positive"));
        }
        if !(self.volume_floor > 0.0 && self.volume_floor <= 1.0) {
            return Err(ModulationError::config("volume_floor outside (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.gating_dwell) {
            return Err(ModulationError::config("gating_dwell outside [0, 1]"));
        }
        Ok(())
    }
}
