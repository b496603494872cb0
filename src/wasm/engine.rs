//! DriftEngine - Main WASM interface for the modulation engine

use super::error::EngineError;
use crate::config::{ModulationConfig, ModulationTuning};
use crate::graph::CommandGraph;
use crate::port::SourceRef;
use crate::random::RandomRange;
use crate::supervisor::{EndedAction, ModulationSupervisor, PlaybackEvent};
use crate::tracks::TrackList;
use serde::Serialize;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| EngineError::from(e).into_js())
}

/// Main WASM interface for the modulation engine
#[wasm_bindgen]
pub struct DriftEngine {
    supervisor: ModulationSupervisor<CommandGraph>,
    tracks: TrackList,
    random: RandomRange,
}

impl Default for DriftEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl DriftEngine {
    /// Create an engine with the default settings
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        // Initialize panic hook for better error messages
        console_error_panic_hook::set_once();

        Self {
            supervisor: ModulationSupervisor::new(CommandGraph::new(), ModulationConfig::default()),
            tracks: TrackList::default(),
            random: RandomRange::from_system_time(),
        }
    }

    /// Create an engine from stored settings
    pub fn with_config(config: JsValue) -> Result<DriftEngine, JsValue> {
        let config: ModulationConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| EngineError::from(e).into_js())?;
        config
            .validate()
            .map_err(|e| EngineError::from(e).into_js())?;

        let mut engine = Self::new();
        engine.supervisor = ModulationSupervisor::new(CommandGraph::new(), config);
        Ok(engine)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn get_config(&self) -> Result<JsValue, JsValue> {
        to_js(self.supervisor.config())
    }

    /// Apply a settings snapshot. Invalid snapshots are rejected and the
    /// previous settings stay active.
    pub fn settings_changed(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: ModulationConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| EngineError::from(e).into_js())?;
        self.supervisor
            .on_settings_changed(config)
            .map_err(|e| EngineError::from(e).into_js())
    }

    /// Replace the engine constants
    pub fn set_tuning(&mut self, tuning: JsValue) -> Result<(), JsValue> {
        let tuning: ModulationTuning = serde_wasm_bindgen::from_value(tuning)
            .map_err(|e| EngineError::from(e).into_js())?;
        self.supervisor
            .set_tuning(tuning)
            .map_err(|e| EngineError::from(e).into_js())
    }

    // =========================================================================
    // Playback Events
    // =========================================================================

    pub fn await_first_interaction(&mut self) {
        self.supervisor.await_first_interaction();
    }

    /// Returns true the first time only
    pub fn first_interaction(&mut self) -> bool {
        self.supervisor.on_first_user_interaction()
    }

    pub fn track_changed(&mut self, src: &str) {
        self.supervisor.on_track_change(SourceRef::new(src));
    }

    pub fn played(&mut self) -> bool {
        self.supervisor.on_play()
    }

    pub fn paused(&mut self) -> bool {
        self.supervisor.on_pause()
    }

    /// Returns the next track to load when shuffle is on
    pub fn ended(&mut self) -> Option<String> {
        match self.supervisor.on_ended() {
            EndedAction::RequestTrack => self.next_track(),
            EndedAction::Stop => None,
        }
    }

    /// Dispatch a serialized `PlaybackEvent`
    pub fn handle_event(&mut self, event: JsValue) -> Result<JsValue, JsValue> {
        let event: PlaybackEvent = serde_wasm_bindgen::from_value(event)
            .map_err(|e| EngineError::from(e).into_js())?;
        to_js(&self.supervisor.handle_event(event))
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Move to `now_seconds` on the audio clock, run due ticks and return the
    /// graph commands they produced
    pub fn advance(&mut self, now_seconds: f64) -> Result<JsValue, JsValue> {
        self.supervisor.graph_mut().set_time(now_seconds);
        self.supervisor.advance();
        self.drain_commands()
    }

    /// Commands produced by event handlers since the last drain
    pub fn drain_commands(&mut self) -> Result<JsValue, JsValue> {
        let commands = self.supervisor.graph_mut().drain_commands();
        to_js(&commands)
    }

    /// Audio-clock time of the next tick, if any
    pub fn next_wakeup(&self) -> Option<f64> {
        self.supervisor.next_wakeup()
    }

    // =========================================================================
    // Display
    // =========================================================================

    #[wasm_bindgen(getter)]
    pub fn playback_rate(&self) -> f64 {
        self.supervisor.playback_rate()
    }

    pub fn get_lifecycle(&self) -> Result<JsValue, JsValue> {
        to_js(&self.supervisor.lifecycle())
    }

    pub fn get_beat_frequencies(&self) -> Result<JsValue, JsValue> {
        let frequencies = self
            .supervisor
            .beat_frequencies()
            .map(|f| [f.left, f.right]);
        to_js(&frequencies)
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    /// Load `tracklist.json` contents. Returns the track count.
    pub fn load_tracklist(&mut self, json: &str) -> Result<usize, JsValue> {
        self.tracks = TrackList::from_json(json).map_err(|e| EngineError::from(e).into_js())?;
        Ok(self.tracks.len())
    }

    pub fn get_tracks(&self) -> Result<JsValue, JsValue> {
        to_js(&self.tracks)
    }

    /// Audio path of a random track other than the current one
    pub fn next_track(&mut self) -> Option<String> {
        self.tracks
            .pick_next(&mut self.random, self.supervisor.source())
            .map(|t| t.audio.clone())
    }
}
