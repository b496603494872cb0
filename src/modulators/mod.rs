//! Modulation Loops
//!
//! Five independent self-rescheduling loops. Each tick reads the config,
//! samples its targets, issues ramped parameter changes through the port and
//! (except for the binaural pair) reschedules itself through its own
//! [`LoopHandle`](crate::timer::LoopHandle).
//!
//! Coupling between loops is returned as a [`Coupling`] value and routed by
//! the supervisor rather than wired directly between modulators.

mod binaural;
mod filter;
mod gating;
mod panning;
mod playback_rate;

pub use binaural::{BeatChannel, BeatFrequencies, BeatState, BeatVoices, BinauralBeatModulator};
pub use filter::FilterModulator;
pub use gating::{GatingModulator, GatingPhase};
pub use panning::PanningModulator;
pub use playback_rate::PlaybackRateModulator;

use crate::config::{ModulationConfig, ModulationTuning};
use crate::error::ModulationError;
use crate::port::{AudioGraphPort, FilterType, NodeRef, ParamRef};
use crate::random::RandomRange;
use crate::timer::TimerQueue;
use log::warn;
use rand::rngs::SmallRng;

/// Nodes of the playback chain: source → filter → panner → gain → destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainChain {
    pub source: NodeRef,
    pub filter: NodeRef,
    pub panner: NodeRef,
    pub gain: NodeRef,
}

/// Value one loop hands to another after a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coupling {
    /// New filter target; becomes the binaural carrier basis
    FrequencyBasis(f64),
    /// Gating wrote `current_volume`; beat gain must follow
    VolumeChanged(f64),
}

/// Everything a tick may touch, borrowed from the supervisor for one tick
pub struct TickContext<'a, G, R = SmallRng> {
    /// Audio clock at the start of the tick (seconds)
    pub now: f64,
    pub graph: &'a mut G,
    /// `None` until the graph is initialized
    pub chain: Option<&'a MainChain>,
    pub config: &'a ModulationConfig,
    pub tuning: &'a ModulationTuning,
    pub random: &'a mut RandomRange<R>,
    pub timers: &'a mut TimerQueue,
}

impl<'a, G: AudioGraphPort, R> TickContext<'a, G, R> {
    pub fn new(
        graph: &'a mut G,
        chain: Option<&'a MainChain>,
        config: &'a ModulationConfig,
        tuning: &'a ModulationTuning,
        random: &'a mut RandomRange<R>,
        timers: &'a mut TimerQueue,
    ) -> Self {
        Self {
            now: graph.now(),
            graph,
            chain,
            config,
            tuning,
            random,
            timers,
        }
    }

    /// The playback chain, or `NodeUnavailable` during startup/teardown
    pub fn chain(&self) -> Result<MainChain, ModulationError> {
        self.chain.copied().ok_or(ModulationError::NodeUnavailable)
    }

    /// Ramp a parameter; failures are logged and reported as `false`
    pub(crate) fn ramp(&mut self, param: ParamRef, target: f64, duration: f64) -> bool {
        match self.graph.ramp_param(param, target, duration) {
            Ok(()) => true,
            Err(e) => {
                warn!("ramp of {:?} skipped: {}", param.param, e);
                false
            }
        }
    }

    pub(crate) fn filter_type(&mut self, filter: NodeRef, kind: FilterType) -> bool {
        match self.graph.set_filter_type(filter, kind) {
            Ok(()) => true,
            Err(e) => {
                warn!("filter type change skipped: {}", e);
                false
            }
        }
    }
}
