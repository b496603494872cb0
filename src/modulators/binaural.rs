//! Binaural beat overlay
//!
//! Two oscillators panned hard left and hard right whose frequencies differ by
//! a beat width between sub-1 Hz and ~19 Hz. The carrier follows the filter
//! sweep (scaled down into a low register) and the gain follows the gated
//! volume, so the overlay sits under the track instead of over it.
//!
//! The supervisor creates and destroys the nodes; this modulator tracks the
//! pair's lifecycle and issues parameter changes on it.

use super::TickContext;
use crate::config::{ModulationConfig, ModulationTuning};
use crate::error::ModulationError;
use crate::port::{AudioGraphPort, AudioParam, NodeRef, ParamRef};
use crate::random::RandomRange;
use crate::state::SharedModulationState;
use log::trace;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Oscillator → gain → panner for one ear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatChannel {
    pub oscillator: NodeRef,
    pub gain: NodeRef,
    pub panner: NodeRef,
}

impl BeatChannel {
    fn frequency(&self) -> ParamRef {
        ParamRef::new(self.oscillator, AudioParam::Frequency)
    }

    fn gain(&self) -> ParamRef {
        ParamRef::new(self.gain, AudioParam::Gain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatVoices {
    pub left: BeatChannel,
    pub right: BeatChannel,
}

impl BeatVoices {
    /// Every node of the pair, oscillators first
    pub fn nodes(&self) -> [NodeRef; 6] {
        [
            self.left.oscillator,
            self.right.oscillator,
            self.left.gain,
            self.left.panner,
            self.right.gain,
            self.right.panner,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatState {
    Stopped,
    /// Nodes are being created and started
    Starting,
    Running,
    /// Oscillators are being stopped; they are never reused
    Stopping,
}

/// Left/right frequency pair for one update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatFrequencies {
    pub left: f64,
    pub right: f64,
}

impl BeatFrequencies {
    /// Perceived beat (Hz)
    pub fn width(&self) -> f64 {
        (self.left - self.right).abs()
    }
}

/// Lifecycle and parameter control of the binaural pair
#[derive(Debug, Clone)]
pub struct BinauralBeatModulator {
    state: BeatState,
    voices: Option<BeatVoices>,
    frequencies: Option<BeatFrequencies>,
    gain: Option<f64>,
}

impl Default for BinauralBeatModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl BinauralBeatModulator {
    pub fn new() -> Self {
        Self {
            state: BeatState::Stopped,
            voices: None,
            frequencies: None,
            gain: None,
        }
    }

    pub fn state(&self) -> BeatState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == BeatState::Running
    }

    pub fn voices(&self) -> Option<&BeatVoices> {
        self.voices.as_ref()
    }

    pub fn frequencies(&self) -> Option<BeatFrequencies> {
        self.frequencies
    }

    /// Last gain applied to both channels
    pub fn gain(&self) -> Option<f64> {
        self.gain
    }

    /// Stopped → Starting. Refused unless stopped.
    pub(crate) fn begin_start(&mut self) -> bool {
        if self.state != BeatState::Stopped {
            return false;
        }
        self.state = BeatState::Starting;
        true
    }

    /// Starting → Running with freshly created voices
    pub(crate) fn attach(&mut self, voices: BeatVoices) {
        debug_assert_eq!(self.state, BeatState::Starting);
        self.voices = Some(voices);
        self.state = BeatState::Running;
    }

    /// Starting → Stopped when node creation failed
    pub(crate) fn abort_start(&mut self) {
        self.voices = None;
        self.state = BeatState::Stopped;
        self.frequencies = None;
        self.gain = None;
    }

    /// Running → Stopping, handing the voices back for teardown
    pub(crate) fn detach(&mut self) -> Option<BeatVoices> {
        if self.state != BeatState::Running {
            return None;
        }
        self.state = BeatState::Stopping;
        self.voices.take()
    }

    /// Stopping → Stopped
    pub(crate) fn finish_stop(&mut self) {
        self.state = BeatState::Stopped;
        self.frequencies = None;
        self.gain = None;
    }

    /// Pick the next left/right frequencies from a filter basis.
    ///
    /// The carrier is a value between `filter_min` and the basis, divided
    /// down into a low register. Which ear gets the lower tone is random.
    pub fn plan_frequencies<R: RngCore>(
        random: &mut RandomRange<R>,
        config: &ModulationConfig,
        tuning: &ModulationTuning,
        basis: f64,
    ) -> BeatFrequencies {
        let carrier = random.between(config.filter_min, basis) / random.sample(tuning.beat_divisor);
        let width = random.sample(tuning.beat_width_hz);
        let base = carrier.max(width / 2.0 + tuning.min_oscillator_hz);
        let low = base - width / 2.0;
        let high = base + width / 2.0;
        if random.coin() {
            BeatFrequencies {
                left: low,
                right: high,
            }
        } else {
            BeatFrequencies {
                left: high,
                right: low,
            }
        }
    }

    /// Gain for both channels: a small factor of the current volume
    pub fn plan_gain<R: RngCore>(
        random: &mut RandomRange<R>,
        tuning: &ModulationTuning,
        shared: &SharedModulationState,
    ) -> f64 {
        random.sample(tuning.beat_gain) * shared.current_volume()
    }

    /// Set starting values on voices that are not yet sounding
    pub(crate) fn prime<G: AudioGraphPort>(
        &mut self,
        graph: &mut G,
        voices: &BeatVoices,
        frequencies: BeatFrequencies,
        gain: f64,
    ) -> Result<(), ModulationError> {
        graph.set_param_immediate(ParamRef::new(voices.left.panner, AudioParam::Pan), -1.0)?;
        graph.set_param_immediate(ParamRef::new(voices.right.panner, AudioParam::Pan), 1.0)?;
        graph.set_param_immediate(voices.left.gain(), gain)?;
        graph.set_param_immediate(voices.right.gain(), gain)?;
        graph.set_param_immediate(voices.left.frequency(), frequencies.left)?;
        graph.set_param_immediate(voices.right.frequency(), frequencies.right)?;
        self.frequencies = Some(frequencies);
        self.gain = Some(gain);
        Ok(())
    }

    /// Retune the pair around a new filter basis. No-op unless running.
    pub fn update_frequencies<G: AudioGraphPort, R: RngCore>(
        &mut self,
        basis: f64,
        ctx: &mut TickContext<'_, G, R>,
    ) -> Option<BeatFrequencies> {
        let voices = self.running_voices()?;
        let next = Self::plan_frequencies(ctx.random, ctx.config, ctx.tuning, basis);
        let duration = ctx.tuning.ramp * ctx.random.sample(ctx.tuning.beat_ramp_factor);

        let left = ctx.ramp(voices.left.frequency(), next.left, duration);
        let right = ctx.ramp(voices.right.frequency(), next.right, duration);
        if !(left && right) {
            return None;
        }
        trace!(
            "beat {:.1}/{:.1} Hz (width {:.2})",
            next.left,
            next.right,
            next.width()
        );
        self.frequencies = Some(next);
        Some(next)
    }

    /// Follow `current_volume`. Always ramped; the tones never stop while running.
    pub fn apply_gain<G: AudioGraphPort, R: RngCore>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
        shared: &SharedModulationState,
    ) -> Option<f64> {
        let voices = self.running_voices()?;
        let gain = Self::plan_gain(ctx.random, ctx.tuning, shared);
        let ramp = ctx.tuning.ramp;
        let left = ctx.ramp(voices.left.gain(), gain, ramp);
        let right = ctx.ramp(voices.right.gain(), gain, ramp);
        if !(left && right) {
            return None;
        }
        self.gain = Some(gain);
        Some(gain)
    }

    fn running_voices(&self) -> Option<BeatVoices> {
        if self.state != BeatState::Running {
            return None;
        }
        self.voices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModulationConfig;
    use crate::graph::CommandGraph;
    use crate::modulators::testing::Rig;
    use crate::port::Connection;

    fn build_voices(graph: &mut CommandGraph) -> BeatVoices {
        let (left_osc, right_osc) = graph.create_oscillator_pair().unwrap();
        let mut channel = |oscillator: NodeRef| {
            let gain = graph.create_gain().unwrap();
            let panner = graph.create_panner().unwrap();
            graph.connect(oscillator, Connection::Node(gain)).unwrap();
            graph.connect(gain, Connection::Node(panner)).unwrap();
            BeatChannel {
                oscillator,
                gain,
                panner,
            }
        };
        BeatVoices {
            left: channel(left_osc),
            right: channel(right_osc),
        }
    }

    fn running(rig: &mut Rig) -> BinauralBeatModulator {
        let mut beats = BinauralBeatModulator::new();
        let voices = build_voices(&mut rig.graph);
        assert!(beats.begin_start());
        beats.attach(voices);
        rig.graph.clear_commands();
        beats
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut rig = Rig::new(ModulationConfig::default());
        let mut beats = BinauralBeatModulator::new();
        assert_eq!(beats.state(), BeatState::Stopped);
        assert_eq!(beats.detach(), None);

        assert!(beats.begin_start());
        assert!(!beats.begin_start());
        assert_eq!(beats.state(), BeatState::Starting);

        let voices = build_voices(&mut rig.graph);
        beats.attach(voices);
        assert!(beats.is_running());

        assert_eq!(beats.detach(), Some(voices));
        assert_eq!(beats.state(), BeatState::Stopping);
        beats.finish_stop();
        assert_eq!(beats.state(), BeatState::Stopped);
        assert!(beats.voices().is_none());
    }

    #[test]
    fn test_planned_width_in_band() {
        let mut random = RandomRange::from_seed(42);
        let config = ModulationConfig::default();
        let tuning = ModulationTuning::default();
        for _ in 0..1000 {
            let f = BinauralBeatModulator::plan_frequencies(&mut random, &config, &tuning, 1500.0);
            assert!(f.width() >= 0.5 - 1e-9 && f.width() <= 19.0 + 1e-9);
            assert!(f.left >= tuning.min_oscillator_hz && f.right >= tuning.min_oscillator_hz);
            // Carrier stays well under the basis
            assert!((f.left + f.right) / 2.0 <= 1500.0 / 3.0 + 1e-9);
        }
    }

    #[test]
    fn test_lower_tone_side_varies() {
        let mut random = RandomRange::from_seed(5);
        let config = ModulationConfig::default();
        let tuning = ModulationTuning::default();
        let mut left_low = 0;
        for _ in 0..200 {
            let f = BinauralBeatModulator::plan_frequencies(&mut random, &config, &tuning, 1000.0);
            if f.left < f.right {
                left_low += 1;
            }
        }
        assert!(left_low > 50 && left_low < 150, "left low {}", left_low);
    }

    #[test]
    fn test_low_basis_keeps_frequencies_positive() {
        let mut random = RandomRange::from_seed(11);
        let config = ModulationConfig {
            filter_min: 5.0,
            filter_max: 10.0,
            ..Default::default()
        };
        let tuning = ModulationTuning::default();
        for _ in 0..500 {
            let f = BinauralBeatModulator::plan_frequencies(&mut random, &config, &tuning, 8.0);
            assert!(f.left.min(f.right) >= tuning.min_oscillator_hz - 1e-9);
        }
    }

    #[test]
    fn test_update_ramps_both_oscillators() {
        let mut rig = Rig::new(ModulationConfig::default());
        let mut beats = running(&mut rig);
        let voices = *beats.voices().unwrap();

        let next = beats.update_frequencies(1200.0, &mut rig.ctx()).unwrap();

        assert_eq!(rig.graph.ramp_targets(voices.left.frequency()), vec![next.left]);
        assert_eq!(rig.graph.ramp_targets(voices.right.frequency()), vec![next.right]);
        assert_eq!(beats.frequencies(), Some(next));
    }

    #[test]
    fn test_update_is_noop_when_not_running() {
        let mut rig = Rig::new(ModulationConfig::default());
        let mut beats = BinauralBeatModulator::new();
        assert_eq!(beats.update_frequencies(1200.0, &mut rig.ctx()), None);
        assert!(rig.graph.commands().is_empty());
    }

    #[test]
    fn test_gain_follows_current_volume() {
        let mut rig = Rig::new(ModulationConfig::default());
        let mut beats = running(&mut rig);
        let voices = *beats.voices().unwrap();

        rig.shared.set_current_volume(0.0, 0.5);
        let (mut ctx, shared) = rig.split();
        let gain = beats.apply_gain(&mut ctx, shared).unwrap();

        assert!(gain >= 0.004 * 0.5 - 1e-12 && gain <= 0.012 * 0.5 + 1e-12);
        assert_eq!(rig.graph.ramp_targets(voices.left.gain()), vec![gain]);
        assert_eq!(rig.graph.ramp_targets(voices.right.gain()), vec![gain]);
    }

    #[test]
    fn test_prime_sets_pans_hard() {
        let mut rig = Rig::new(ModulationConfig::default());
        let mut beats = BinauralBeatModulator::new();
        let voices = build_voices(&mut rig.graph);
        let freqs = BeatFrequencies {
            left: 100.0,
            right: 110.0,
        };
        beats.prime(&mut rig.graph, &voices, freqs, 0.005).unwrap();

        let pan = |node: NodeRef| rig.graph.param_value(ParamRef::new(node, AudioParam::Pan));
        assert_eq!(pan(voices.left.panner), Some(-1.0));
        assert_eq!(pan(voices.right.panner), Some(1.0));
        assert_eq!(rig.graph.param_value(voices.left.gain()), Some(0.005));
        assert_eq!(beats.frequencies().map(|f| f.width()), Some(10.0));
    }
}
