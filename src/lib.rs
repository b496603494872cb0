//! # Drift: Generative Ambient Modulation
//!
//! `drift` keeps a looping ambient track from ever sounding the same twice.
//! Five independent stochastic loops nudge the playback chain on their own
//! irregular schedules, each picking random targets inside user-configured
//! bounds and ramping towards them:
//!
//! - **Filter** - sweeps a bandpass cutoff and resonance
//! - **Gating** - dips and restores the volume in slow cycles
//! - **Panning** - drifts the stereo position
//! - **Playback rate** - wanders the media speed
//! - **Binaural beat** - a pair of detuned sine tones, one per ear, whose
//!   pitch follows the filter and whose level follows the gating
//!
//! ## Architecture
//!
//! - **Port** - the engine never touches audio hardware. It talks to an
//!   [`AudioGraphPort`] that creates nodes and schedules parameter ramps on
//!   the audio clock. [`CommandGraph`] records those calls as serializable
//!   commands for a host (or a test) to apply.
//! - **Timers** - each loop owns one [`LoopHandle`] over a virtual
//!   [`TimerQueue`]; the host moves the clock and calls
//!   [`ModulationSupervisor::advance`].
//! - **Supervisor** - [`ModulationSupervisor`] reacts to first interaction,
//!   play, pause, track change and settings change, and is the only place
//!   loops are started or cancelled.
//!
//! ## Quick Start
//!
//! ```rust
//! use drift::prelude::*;
//!
//! let mut engine = ModulationSupervisor::new(CommandGraph::new(), ModulationConfig::default());
//! engine.on_first_user_interaction();
//! engine.on_track_change(SourceRef::new("music/tide.mp3"));
//! engine.on_play();
//!
//! for step in 1..=600 {
//!     engine.graph_mut().set_time(step as f64 * 0.1);
//!     engine.advance();
//! }
//! assert!(engine.graph().ramp_count() > 0);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod modulators;
pub mod port;
pub mod random;
pub mod state;
pub mod supervisor;
pub mod timer;
pub mod tracks;

#[cfg(feature = "wasm")]
pub mod wasm;

/// Prelude module for convenient imports
pub mod prelude {
    // Configuration
    pub use crate::config::{ModulationConfig, ModulationTuning};
    pub use crate::error::ModulationError;
    pub use crate::random::{Bounds, RandomRange};

    // Audio graph
    pub use crate::graph::{CommandGraph, GraphCommand};
    pub use crate::port::{
        AudioGraphPort, AudioParam, Connection, FilterType, NodeKind, NodeRef, ParamRef,
        PlaybackPort, SourceRef,
    };

    // Loops
    pub use crate::modulators::{
        BeatFrequencies, BeatState, BinauralBeatModulator, FilterModulator, GatingModulator,
        MainChain, PanningModulator, PlaybackRateModulator,
    };
    pub use crate::state::SharedModulationState;
    pub use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};

    // Lifecycle
    pub use crate::supervisor::{
        EndedAction, ModulationSupervisor, PlaybackEvent, PlaybackLifecycleState,
    };
    pub use crate::tracks::{Track, TrackList};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
