//! Stereo drift of the main chain

use super::TickContext;
use crate::port::{AudioGraphPort, AudioParam, ParamRef};
use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};
use log::trace;
use rand::RngCore;

/// Pans anywhere between hard left and hard right. Always on.
#[derive(Debug, Clone)]
pub struct PanningModulator {
    handle: LoopHandle,
    pan: f64,
}

impl Default for PanningModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PanningModulator {
    pub fn new() -> Self {
        Self {
            handle: LoopHandle::new(LoopKind::Panning),
            pan: 0.0,
        }
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Last pan target
    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn fire<G: AudioGraphPort, R: RngCore>(
        &mut self,
        fired: Option<TimerId>,
        ctx: &mut TickContext<'_, G, R>,
    ) {
        if !self.handle.claim(fired, ctx.timers) {
            trace!("stale panning timer ignored");
            return;
        }
        self.tick(ctx);
        self.handle.finish();
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        self.handle.cancel(timers);
    }

    fn tick<G: AudioGraphPort, R: RngCore>(&mut self, ctx: &mut TickContext<'_, G, R>) {
        if let Ok(chain) = ctx.chain() {
            let pan = ctx.random.between(-1.0, 1.0);
            if ctx.ramp(
                ParamRef::new(chain.panner, AudioParam::Pan),
                pan,
                ctx.tuning.panning_ramp,
            ) {
                self.pan = pan;
            }
        } else {
            trace!("panning tick skipped: graph not initialized");
        }
        let delay = ctx.random.sample(ctx.tuning.panning_delay_ms) / 1000.0;
        self.handle.schedule(ctx.timers, ctx.now, delay);
    }
}
