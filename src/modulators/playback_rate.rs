//! Playback speed wander

use super::TickContext;
use crate::port::{AudioGraphPort, PlaybackPort};
use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};
use log::trace;
use rand::RngCore;

/// Picks a new playback rate each tick. When disabled the rate is pinned to
/// exactly 1.0 but the loop keeps ticking, so re-enabling needs no restart.
#[derive(Debug, Clone)]
pub struct PlaybackRateModulator {
    handle: LoopHandle,
    rate: f64,
}

impl Default for PlaybackRateModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackRateModulator {
    pub fn new() -> Self {
        Self {
            handle: LoopHandle::new(LoopKind::PlaybackRate),
            rate: 1.0,
        }
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Rate most recently applied to the media element
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn fire<G: AudioGraphPort + PlaybackPort, R: RngCore>(
        &mut self,
        fired: Option<TimerId>,
        ctx: &mut TickContext<'_, G, R>,
    ) {
        if !self.handle.claim(fired, ctx.timers) {
            trace!("stale playback-rate timer ignored");
            return;
        }
        self.tick(ctx);
        self.handle.finish();
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        self.handle.cancel(timers);
    }

    fn tick<G: AudioGraphPort + PlaybackPort, R: RngCore>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
    ) {
        let rate = if ctx.config.enable_playback_rate {
            ctx.random.sample(ctx.tuning.playback_rate)
        } else {
            1.0
        };
        ctx.graph.set_playback_rate(rate);
        self.rate = rate;

        let delay = ctx.random.sample(ctx.tuning.playback_rate_delay_ms) / 1000.0;
        self.handle.schedule(ctx.timers, ctx.now, delay);
        trace!("playback rate {:.2}x", rate);
    }
}
