//! Cross-Loop Coupling State
//!
//! The only values shared between loops. `current_volume` has a single
//! writer (gating) and a single reader (beat gain); `beats_running` guards
//! the binaural pair against double starts. Every write is appended to a
//! bounded change log so coupling can be inspected after the fact.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Volume before gating has produced a value
pub const INITIAL_VOLUME: f64 = 1.0;

const LOG_CAPACITY: usize = 64;

/// A recorded write to the shared state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StateChange {
    Volume { at: f64, value: f64 },
    BeatsRunning { at: f64, running: bool },
    Reset { at: f64 },
}

#[derive(Debug, Clone)]
pub struct SharedModulationState {
    current_volume: f64,
    beats_running: bool,
    log: VecDeque<StateChange>,
}

impl Default for SharedModulationState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedModulationState {
    pub fn new() -> Self {
        Self {
            current_volume: INITIAL_VOLUME,
            beats_running: false,
            log: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn beats_running(&self) -> bool {
        self.beats_running
    }

    /// Written by the gating loop only
    pub fn set_current_volume(&mut self, at: f64, value: f64) {
        self.current_volume = value;
        self.record(StateChange::Volume { at, value });
    }

    pub fn set_beats_running(&mut self, at: f64, running: bool) {
        self.beats_running = running;
        self.record(StateChange::BeatsRunning { at, running });
    }

    /// Restore initial values (track change)
    pub fn reset(&mut self, at: f64) {
        self.current_volume = INITIAL_VOLUME;
        self.beats_running = false;
        self.record(StateChange::Reset { at });
    }

    /// Recent writes, oldest first
    pub fn changes(&self) -> impl Iterator<Item = &StateChange> {
        self.log.iter()
    }

    pub fn last_change(&self) -> Option<&StateChange> {
        self.log.back()
    }

    fn record(&mut self, change: StateChange) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(change);
    }
}
