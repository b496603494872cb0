//! Audio Backend Ports
//!
//! The engine never owns audio primitives directly. It drives them through
//! [`AudioGraphPort`] (ramped parameter control, node creation, oscillator
//! lifecycle) and [`PlaybackPort`] (the media element playing the track).
//! Any backend that can express "ramp this parameter to a value over a
//! duration" can host the engine.

use crate::error::ModulationError;
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Opaque reference to a node owned by the audio backend
    pub struct NodeRef;
}

/// Automatable parameter on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioParam {
    /// Filter cutoff/center or oscillator frequency (Hz)
    Frequency,
    /// Filter resonance
    Q,
    /// Linear gain
    Gain,
    /// Stereo position, -1 (left) to 1 (right)
    Pan,
}

/// A specific parameter on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamRef {
    pub node: NodeRef,
    pub param: AudioParam,
}

impl ParamRef {
    pub fn new(node: NodeRef, param: AudioParam) -> Self {
        Self { node, param }
    }
}

/// Biquad response used by the main filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Kind of node a backend created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    MediaSource,
    Filter,
    Gain,
    Panner,
    Oscillator,
}

/// Downstream end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "node")]
pub enum Connection {
    Node(NodeRef),
    Destination,
}

/// Reference to a playable track (URL, object URL or file path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceRef {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// Capabilities the engine consumes from the audio graph backend.
///
/// Oscillators are single-use: once stopped they can never be started again.
pub trait AudioGraphPort {
    /// Current audio clock time in seconds
    fn now(&self) -> f64;

    /// Linear ramp from the current value to `target`, ending `duration` seconds from now
    fn ramp_param(
        &mut self,
        param: ParamRef,
        target: f64,
        duration: f64,
    ) -> Result<(), ModulationError>;

    /// Set a value without smoothing
    fn set_param_immediate(&mut self, param: ParamRef, value: f64)
        -> Result<(), ModulationError>;

    /// Create the left/right oscillators for a binaural pair
    fn create_oscillator_pair(&mut self) -> Result<(NodeRef, NodeRef), ModulationError>;

    fn start_oscillator(&mut self, oscillator: NodeRef) -> Result<(), ModulationError>;

    /// Terminal: a stopped oscillator must be recreated, not restarted
    fn stop_oscillator(&mut self, oscillator: NodeRef) -> Result<(), ModulationError>;

    fn create_gain(&mut self) -> Result<NodeRef, ModulationError>;

    fn create_panner(&mut self) -> Result<NodeRef, ModulationError>;

    fn create_filter(&mut self) -> Result<NodeRef, ModulationError>;

    /// Node fed by the playback element
    fn create_media_source(&mut self) -> Result<NodeRef, ModulationError>;

    fn connect(&mut self, from: NodeRef, to: Connection) -> Result<(), ModulationError>;

    fn set_filter_type(&mut self, filter: NodeRef, kind: FilterType)
        -> Result<(), ModulationError>;

    /// Disconnect a node and let the backend drop it. The reference is
    /// invalid afterwards.
    fn release_node(&mut self, node: NodeRef) -> Result<(), ModulationError>;
}

/// The media element playing the current track
pub trait PlaybackPort {
    fn load_source(&mut self, source: &SourceRef);

    /// Playback speed; 1.0 is normal
    fn set_playback_rate(&mut self, rate: f64);
}
