//! Error taxonomy for the modulation engine
//!
//! None of these errors are fatal. Port failures inside a tick are logged and
//! the tick is skipped; config errors cause the supervisor to keep the last
//! valid snapshot.

use thiserror::Error;

/// Errors produced by the audio-graph port, config validation and JSON parsing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModulationError {
    /// A config snapshot violated its bounds
    #[error("invalid config: {reason}")]
    ConfigInvalid { reason: String },

    /// The audio graph has not been initialized yet
    #[error("audio graph not initialized")]
    NodeUnavailable,

    /// The port does not know this node (stale or foreign reference)
    #[error("unknown audio node")]
    UnknownNode,

    /// An oscillator was started twice
    #[error("oscillator already started")]
    DoubleStart,

    /// An oscillator was stopped twice
    #[error("oscillator already stopped")]
    DoubleStop,

    /// Stopped oscillators are terminal and must be recreated
    #[error("oscillator stopped; create a new one instead of restarting")]
    OscillatorStopped,

    /// JSON input could not be parsed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ModulationError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        ModulationError::ConfigInvalid {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ModulationError {
    fn from(e: serde_json::Error) -> Self {
        ModulationError::Serialization(e.to_string())
    }
}
