//! Spectral sweep of the main filter

use super::{Coupling, TickContext};
use crate::port::{AudioGraphPort, AudioParam, FilterType, ParamRef};
use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};
use log::{debug, trace};
use rand::RngCore;

/// Moves the band-pass center to a random frequency inside the configured
/// bounds, then waits a random delay before the next move. The target is
/// forwarded to the binaural pair as its frequency basis.
#[derive(Debug, Clone)]
pub struct FilterModulator {
    handle: LoopHandle,
    last_target: Option<f64>,
    last_delay: Option<f64>,
}

impl Default for FilterModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterModulator {
    pub fn new() -> Self {
        Self {
            handle: LoopHandle::new(LoopKind::Filter),
            last_target: None,
            last_delay: None,
        }
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Most recent sweep target (Hz)
    pub fn last_target(&self) -> Option<f64> {
        self.last_target
    }

    /// Most recent reschedule delay (seconds)
    pub fn last_delay(&self) -> Option<f64> {
        self.last_delay
    }

    /// Run a tick for a fired timer, or immediately when `fired` is `None`
    pub fn fire<G: AudioGraphPort, R: RngCore>(
        &mut self,
        fired: Option<TimerId>,
        ctx: &mut TickContext<'_, G, R>,
    ) -> Option<Coupling> {
        if !self.handle.claim(fired, ctx.timers) {
            trace!("stale filter timer ignored");
            return None;
        }
        let coupling = self.tick(ctx);
        self.handle.finish();
        coupling
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        self.handle.cancel(timers);
    }

    fn tick<G: AudioGraphPort, R: RngCore>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
    ) -> Option<Coupling> {
        let Ok(chain) = ctx.chain() else {
            trace!("filter tick skipped: graph not initialized");
            self.schedule_next(ctx);
            return None;
        };
        let frequency = ParamRef::new(chain.filter, AudioParam::Frequency);
        let ramp = ctx.tuning.ramp;

        if !ctx.config.enable_filter {
            // Open the filter to its fixed maximum and end the chain
            ctx.filter_type(chain.filter, FilterType::Lowpass);
            ctx.ramp(frequency, ctx.config.filter_max, ramp);
            self.last_target = None;
            debug!("filter disabled, opened to {:.1} Hz", ctx.config.filter_max);
            return None;
        }

        let target = ctx.random.sample(ctx.config.filter_bounds());
        let q = ctx.random.sample(ctx.tuning.filter_q);
        ctx.filter_type(chain.filter, FilterType::Bandpass);
        ctx.ramp(ParamRef::new(chain.filter, AudioParam::Q), q, ramp);
        let applied = ctx.ramp(frequency, target, ramp);

        let delay = self.schedule_next(ctx);

        if !applied {
            return None;
        }
        self.last_target = Some(target);
        trace!("filter -> {:.1} Hz, next in {:.2}s", target, delay);
        Some(Coupling::FrequencyBasis(target))
    }

    fn schedule_next<G: AudioGraphPort, R: RngCore>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
    ) -> f64 {
        let delay = ctx.random.sample(ctx.tuning.filter_delay_ms) / 1000.0;
        self.handle.schedule(ctx.timers, ctx.now, delay);
        self.last_delay = Some(delay);
        delay
    }
}
