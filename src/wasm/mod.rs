//! WASM bindings for Drift
//!
//! The browser owns the real audio graph and the clock. JavaScript forwards
//! media element events, calls `advance(now)` from a timer, and applies the
//! returned commands to its Web Audio nodes.

mod engine;
mod error;

pub use engine::DriftEngine;
pub use error::EngineError;

// Re-export wasm_bindgen for convenience
pub use wasm_bindgen::prelude::*;
