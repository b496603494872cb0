//! Modulation Supervisor
//!
//! The single authority over which loops are alive. It owns the config, the
//! shared coupling state, the timer queue and every audio node the engine
//! creates, and it reacts to playback lifecycle events:
//!
//! ```text
//! Idle ─► AwaitingFirstInteraction ─► Armed ─► Playing ⇄ Paused
//!   └──────────── first interaction ───┘
//! ```
//!
//! Loops only run while `Playing`. Every transition out of `Playing` cancels
//! all loop timers before doing anything else, so no stale tick can touch
//! nodes that were just torn down.
//!
//! # Example
//!
//! ```rust
//! use drift::prelude::*;
//!
//! let mut engine = ModulationSupervisor::new(CommandGraph::new(), ModulationConfig::default());
//! engine.on_first_user_interaction();
//! engine.on_track_change(SourceRef::new("music/drone.mp3"));
//! engine.on_play();
//!
//! // Host loop: move the audio clock, fire due ticks, apply the commands
//! engine.graph_mut().set_time(1.0);
//! engine.advance();
//! let commands = engine.graph_mut().drain_commands();
//! assert!(!commands.is_empty());
//! ```

use crate::config::{ModulationConfig, ModulationTuning};
use crate::error::ModulationError;
use crate::modulators::{
    BeatChannel, BeatFrequencies, BeatState, BeatVoices, BinauralBeatModulator, Coupling,
    FilterModulator, GatingModulator, MainChain, PanningModulator, PlaybackRateModulator,
    TickContext,
};
use crate::port::{
    AudioGraphPort, AudioParam, Connection, NodeRef, ParamRef, PlaybackPort, SourceRef,
};
use crate::random::RandomRange;
use crate::state::SharedModulationState;
use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};
use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Whether loops may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackLifecycleState {
    Idle,
    /// The UI is up and waiting for the gesture that unlocks audio
    AwaitingFirstInteraction,
    /// Audio is unlocked and the graph exists, nothing playing yet
    Armed,
    Playing,
    Paused,
}

/// Events emitted by the playback-source collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "source")]
pub enum PlaybackEvent {
    TrackChanged(SourceRef),
    Played,
    Paused,
    Ended,
}

/// What the host should do after a track ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndedAction {
    /// Shuffle is on: pick another track and play it
    RequestTrack,
    Stop,
}

#[derive(Debug, Default)]
struct Loops {
    filter: FilterModulator,
    gating: GatingModulator,
    panning: PanningModulator,
    playback_rate: PlaybackRateModulator,
    binaural: BinauralBeatModulator,
}

/// Owns every loop and node of one playback session
pub struct ModulationSupervisor<G, R = SmallRng> {
    graph: G,
    random: RandomRange<R>,
    config: ModulationConfig,
    tuning: ModulationTuning,
    shared: SharedModulationState,
    timers: TimerQueue,
    lifecycle: PlaybackLifecycleState,
    chain: Option<MainChain>,
    source: Option<SourceRef>,
    loops: Loops,
}

impl<G: AudioGraphPort + PlaybackPort> ModulationSupervisor<G, SmallRng> {
    /// Create a supervisor with an unseeded random source
    pub fn new(graph: G, config: ModulationConfig) -> Self {
        Self::with_random(graph, config, RandomRange::from_system_time())
    }
}

impl<G: AudioGraphPort + PlaybackPort, R: RngCore> ModulationSupervisor<G, R> {
    pub fn with_random(graph: G, config: ModulationConfig, random: RandomRange<R>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("initial config rejected ({}), using defaults", e);
                ModulationConfig::default()
            }
        };
        Self {
            graph,
            random,
            config,
            tuning: ModulationTuning::default(),
            shared: SharedModulationState::new(),
            timers: TimerQueue::new(),
            lifecycle: PlaybackLifecycleState::Idle,
            chain: None,
            source: None,
            loops: Loops::default(),
        }
    }

    /// Replace the engine constants. Invalid tuning is ignored.
    pub fn with_tuning(mut self, tuning: ModulationTuning) -> Self {
        if let Err(e) = self.set_tuning(tuning) {
            warn!("tuning rejected ({}), keeping defaults", e);
        }
        self
    }

    /// Takes effect from the next tick of each loop
    pub fn set_tuning(&mut self, tuning: ModulationTuning) -> Result<(), ModulationError> {
        tuning.validate()?;
        self.tuning = tuning;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn lifecycle(&self) -> PlaybackLifecycleState {
        self.lifecycle
    }

    pub fn config(&self) -> &ModulationConfig {
        &self.config
    }

    pub fn tuning(&self) -> &ModulationTuning {
        &self.tuning
    }

    pub fn shared(&self) -> &SharedModulationState {
        &self.shared
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn chain(&self) -> Option<&MainChain> {
        self.chain.as_ref()
    }

    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    pub fn loop_handle(&self, kind: LoopKind) -> &LoopHandle {
        match kind {
            LoopKind::Filter => self.loops.filter.handle(),
            LoopKind::Gating => self.loops.gating.handle(),
            LoopKind::Panning => self.loops.panning.handle(),
            LoopKind::PlaybackRate => self.loops.playback_rate.handle(),
        }
    }

    pub fn beat_state(&self) -> BeatState {
        self.loops.binaural.state()
    }

    pub fn beat_voices(&self) -> Option<&BeatVoices> {
        self.loops.binaural.voices()
    }

    pub fn beat_frequencies(&self) -> Option<BeatFrequencies> {
        self.loops.binaural.frequencies()
    }

    pub fn beat_gain(&self) -> Option<f64> {
        self.loops.binaural.gain()
    }

    /// Current media playback rate, for display
    pub fn playback_rate(&self) -> f64 {
        self.loops.playback_rate.rate()
    }

    pub fn filter_target(&self) -> Option<f64> {
        self.loops.filter.last_target()
    }

    pub fn pan(&self) -> f64 {
        self.loops.panning.pan()
    }

    /// Audio-clock time of the next pending tick, so hosts can sleep until then
    pub fn next_wakeup(&self) -> Option<f64> {
        self.timers.next_due()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// The UI is ready and waiting for a user gesture
    pub fn await_first_interaction(&mut self) {
        if self.lifecycle == PlaybackLifecycleState::Idle {
            self.lifecycle = PlaybackLifecycleState::AwaitingFirstInteraction;
        }
    }

    /// Unlock audio. Builds the playback chain; only the first call has effect.
    pub fn on_first_user_interaction(&mut self) -> bool {
        match self.lifecycle {
            PlaybackLifecycleState::Idle | PlaybackLifecycleState::AwaitingFirstInteraction => {}
            _ => return false,
        }
        self.lifecycle = PlaybackLifecycleState::Armed;
        self.ensure_chain();
        info!("audio unlocked by first interaction");
        true
    }

    /// Swap the track. Cancels every loop before the new source loads and
    /// restarts them only if playback was already running.
    pub fn on_track_change(&mut self, source: SourceRef) {
        self.cancel_loops();
        self.stop_beats();
        let now = self.graph.now();
        self.shared.reset(now);

        info!("loading track {}", source.as_str());
        self.graph.load_source(&source);
        self.source = Some(source);

        if self.lifecycle == PlaybackLifecycleState::Playing {
            self.start_loops();
            self.start_beats();
        }
    }

    /// Start every loop once. A no-op while already playing or before the
    /// first interaction.
    pub fn on_play(&mut self) -> bool {
        match self.lifecycle {
            PlaybackLifecycleState::Armed | PlaybackLifecycleState::Paused => {}
            PlaybackLifecycleState::Playing => {
                trace!("play while playing ignored");
                return false;
            }
            PlaybackLifecycleState::Idle | PlaybackLifecycleState::AwaitingFirstInteraction => {
                debug!("play ignored until first user interaction");
                return false;
            }
        }
        self.ensure_chain();
        self.lifecycle = PlaybackLifecycleState::Playing;
        info!("playback started");
        self.start_loops();
        self.start_beats();
        true
    }

    /// Cancel every loop and stop the oscillators
    pub fn on_pause(&mut self) -> bool {
        if self.lifecycle != PlaybackLifecycleState::Playing {
            return false;
        }
        self.lifecycle = PlaybackLifecycleState::Paused;
        self.cancel_loops();
        self.stop_beats();
        info!("playback paused");
        true
    }

    /// The track finished. Behaves like a pause, then asks for another track
    /// when shuffle is on.
    pub fn on_ended(&mut self) -> EndedAction {
        self.on_pause();
        if self.config.shuffle {
            EndedAction::RequestTrack
        } else {
            EndedAction::Stop
        }
    }

    /// Apply a settings snapshot without restarting running loops.
    ///
    /// Rejected snapshots leave the last valid config in place. A loop whose
    /// toggle went off ends its own chain on its next tick; a loop whose chain
    /// had already ended is resumed when its toggle comes back on.
    pub fn on_settings_changed(&mut self, config: ModulationConfig) -> Result<(), ModulationError> {
        if let Err(e) = config.validate() {
            warn!("settings rejected, keeping last valid config: {}", e);
            return Err(e);
        }
        let previous = std::mem::replace(&mut self.config, config);
        debug!("settings updated");

        if !self.config.enable_gating {
            self.with_tick(|ctx, loops, shared| {
                let coupling = loops.gating.apply_base_volume(ctx, shared);
                route(&mut loops.binaural, coupling, ctx, shared);
            });
        } else if previous.volume != self.config.volume {
            self.with_tick(|ctx, loops, shared| {
                loops.binaural.apply_gain(ctx, shared);
            });
        }

        if self.lifecycle != PlaybackLifecycleState::Playing {
            return Ok(());
        }
        if self.config.enable_filter && self.loops.filter.handle().is_idle() {
            self.run_loop(LoopKind::Filter, None);
        }
        if self.config.enable_gating && self.loops.gating.handle().is_idle() {
            self.run_loop(LoopKind::Gating, None);
        }
        if previous.enable_playback_rate != self.config.enable_playback_rate {
            self.run_loop(LoopKind::PlaybackRate, None);
        }
        if self.config.enable_binaural_beat {
            self.start_beats();
        } else {
            self.stop_beats();
        }
        Ok(())
    }

    /// Dispatch a playback event. Returns the follow-up for `Ended`.
    pub fn handle_event(&mut self, event: PlaybackEvent) -> Option<EndedAction> {
        match event {
            PlaybackEvent::TrackChanged(source) => {
                self.on_track_change(source);
                None
            }
            PlaybackEvent::Played => {
                self.on_play();
                None
            }
            PlaybackEvent::Paused => {
                self.on_pause();
                None
            }
            PlaybackEvent::Ended => Some(self.on_ended()),
        }
    }

    /// Fire every timer due at the graph's current time, earliest first.
    /// Returns the number of ticks run.
    pub fn advance(&mut self) -> usize {
        let now = self.graph.now();
        let mut fired = 0;
        while let Some((id, kind)) = self.timers.pop_due(now) {
            self.run_loop(kind, Some(id));
            fired += 1;
        }
        fired
    }

    // =========================================================================
    // Loops
    // =========================================================================

    fn with_tick<T>(
        &mut self,
        f: impl FnOnce(&mut TickContext<'_, G, R>, &mut Loops, &mut SharedModulationState) -> T,
    ) -> T {
        let Self {
            graph,
            random,
            config,
            tuning,
            shared,
            timers,
            chain,
            loops,
            ..
        } = self;
        let mut ctx = TickContext::new(graph, chain.as_ref(), config, tuning, random, timers);
        f(&mut ctx, loops, shared)
    }

    fn run_loop(&mut self, kind: LoopKind, fired: Option<TimerId>) {
        self.with_tick(|ctx, loops, shared| {
            let coupling = match kind {
                LoopKind::Filter => loops.filter.fire(fired, ctx),
                LoopKind::Gating => loops.gating.fire(fired, ctx, shared),
                LoopKind::Panning => {
                    loops.panning.fire(fired, ctx);
                    None
                }
                LoopKind::PlaybackRate => {
                    loops.playback_rate.fire(fired, ctx);
                    None
                }
            };
            route(&mut loops.binaural, coupling, ctx, shared);
        });
    }

    fn start_loops(&mut self) {
        for kind in LoopKind::ALL {
            self.run_loop(kind, None);
        }
    }

    fn cancel_loops(&mut self) {
        let timers = &mut self.timers;
        self.loops.filter.cancel(timers);
        self.loops.gating.cancel(timers);
        self.loops.panning.cancel(timers);
        self.loops.playback_rate.cancel(timers);
        debug_assert!(timers.is_empty(), "timer outlived its loop");
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn ensure_chain(&mut self) {
        if self.chain.is_some() {
            return;
        }
        match build_chain(&mut self.graph, self.config.volume) {
            Ok(chain) => self.chain = Some(chain),
            Err(e) => warn!("audio graph not initialized: {}", e),
        }
    }

    fn start_beats(&mut self) {
        if self.lifecycle != PlaybackLifecycleState::Playing
            || !self.config.enable_binaural_beat
            || self.shared.beats_running()
        {
            return;
        }
        if !self.loops.binaural.begin_start() {
            return;
        }
        match self.spawn_voices() {
            Ok(voices) => {
                self.loops.binaural.attach(voices);
                let now = self.graph.now();
                self.shared.set_beats_running(now, true);
                info!("binaural beats started");
            }
            Err(e) => {
                warn!("binaural beats not started: {}", e);
                self.loops.binaural.abort_start();
            }
        }
    }

    /// Oscillators are terminal once stopped; a later start builds new ones.
    fn stop_beats(&mut self) {
        if !self.shared.beats_running() {
            return;
        }
        if let Some(voices) = self.loops.binaural.detach() {
            let oscillators = [voices.left.oscillator, voices.right.oscillator];
            teardown(&mut self.graph, &oscillators, &voices.nodes());
        }
        self.loops.binaural.finish_stop();
        let now = self.graph.now();
        self.shared.set_beats_running(now, false);
        info!("binaural beats stopped");
    }

    fn spawn_voices(&mut self) -> Result<BeatVoices, ModulationError> {
        let mut build = VoiceBuild::default();
        let result = self.wire_voices(&mut build);
        if result.is_err() {
            teardown(&mut self.graph, &build.started, &build.nodes);
        }
        result
    }

    fn wire_voices(&mut self, build: &mut VoiceBuild) -> Result<BeatVoices, ModulationError> {
        let (left_osc, right_osc) = self.graph.create_oscillator_pair()?;
        build.nodes.extend([left_osc, right_osc]);
        let voices = BeatVoices {
            left: beat_channel(&mut self.graph, left_osc, build)?,
            right: beat_channel(&mut self.graph, right_osc, build)?,
        };

        let basis = self
            .loops
            .filter
            .last_target()
            .unwrap_or_else(|| self.config.filter_bounds().center());
        let frequencies = BinauralBeatModulator::plan_frequencies(
            &mut self.random,
            &self.config,
            &self.tuning,
            basis,
        );
        let gain = BinauralBeatModulator::plan_gain(&mut self.random, &self.tuning, &self.shared);
        self.loops
            .binaural
            .prime(&mut self.graph, &voices, frequencies, gain)?;

        for oscillator in [left_osc, right_osc] {
            self.graph.start_oscillator(oscillator)?;
            build.started.push(oscillator);
        }
        Ok(voices)
    }
}

/// Nodes of a beat pair under construction
#[derive(Debug, Default)]
struct VoiceBuild {
    nodes: Vec<NodeRef>,
    started: Vec<NodeRef>,
}

/// Stop `oscillators`, then release every node in `nodes`. Failures are
/// logged only.
fn teardown<G: AudioGraphPort>(graph: &mut G, oscillators: &[NodeRef], nodes: &[NodeRef]) {
    for &oscillator in oscillators {
        if let Err(e) = graph.stop_oscillator(oscillator) {
            debug!("oscillator stop: {}", e);
        }
    }
    for &node in nodes {
        if let Err(e) = graph.release_node(node) {
            debug!("node release: {}", e);
        }
    }
}

fn route<G: AudioGraphPort, R: RngCore>(
    binaural: &mut BinauralBeatModulator,
    coupling: Option<Coupling>,
    ctx: &mut TickContext<'_, G, R>,
    shared: &SharedModulationState,
) {
    match coupling {
        Some(Coupling::FrequencyBasis(basis)) => {
            binaural.update_frequencies(basis, ctx);
        }
        Some(Coupling::VolumeChanged(_)) => {
            binaural.apply_gain(ctx, shared);
        }
        None => {}
    }
}

/// source → filter → panner → gain → destination
fn build_chain<G: AudioGraphPort>(graph: &mut G, volume: f64) -> Result<MainChain, ModulationError> {
    let chain = MainChain {
        source: graph.create_media_source()?,
        filter: graph.create_filter()?,
        panner: graph.create_panner()?,
        gain: graph.create_gain()?,
    };
    graph.connect(chain.source, Connection::Node(chain.filter))?;
    graph.connect(chain.filter, Connection::Node(chain.panner))?;
    graph.connect(chain.panner, Connection::Node(chain.gain))?;
    graph.connect(chain.gain, Connection::Destination)?;
    graph.set_param_immediate(ParamRef::new(chain.gain, AudioParam::Gain), volume)?;
    Ok(chain)
}

/// oscillator → gain → panner → destination
fn beat_channel<G: AudioGraphPort>(
    graph: &mut G,
    oscillator: NodeRef,
    build: &mut VoiceBuild,
) -> Result<BeatChannel, ModulationError> {
    let gain = graph.create_gain()?;
    build.nodes.push(gain);
    let panner = graph.create_panner()?;
    build.nodes.push(panner);
    graph.connect(oscillator, Connection::Node(gain))?;
    graph.connect(gain, Connection::Node(panner))?;
    graph.connect(panner, Connection::Destination)?;
    Ok(BeatChannel {
        oscillator,
        gain,
        panner,
    })
}
