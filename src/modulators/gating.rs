//! Volume gating: periodic randomized dips that make the track breathe

use super::{Coupling, TickContext};
use crate::port::{AudioGraphPort, AudioParam, ParamRef};
use crate::state::SharedModulationState;
use crate::timer::{LoopHandle, LoopKind, TimerId, TimerQueue};
use log::{debug, trace};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Which half of the gating cycle the pending timer triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingPhase {
    /// Dip to a random level
    Dip,
    /// Return to the base volume
    Release,
}

/// Each cycle samples a period from the gating bounds, ramps the main gain
/// down to a random level no lower than the volume floor, holds it for a
/// fraction of the period, ramps back to the base volume and waits a random
/// multiple of the period before the next dip.
///
/// This is the only writer of `current_volume`.
#[derive(Debug, Clone)]
pub struct GatingModulator {
    handle: LoopHandle,
    phase: GatingPhase,
    period: f64,
}

impl Default for GatingModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl GatingModulator {
    pub fn new() -> Self {
        Self {
            handle: LoopHandle::new(LoopKind::Gating),
            phase: GatingPhase::Dip,
            period: 0.0,
        }
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    pub fn phase(&self) -> GatingPhase {
        self.phase
    }

    /// Period of the current cycle (seconds)
    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn fire<G: AudioGraphPort, R: RngCore>(
        &mut self,
        fired: Option<TimerId>,
        ctx: &mut TickContext<'_, G, R>,
        shared: &mut SharedModulationState,
    ) -> Option<Coupling> {
        if fired.is_none() {
            // Immediate runs always begin a fresh cycle
            self.phase = GatingPhase::Dip;
        }
        if !self.handle.claim(fired, ctx.timers) {
            trace!("stale gating timer ignored");
            return None;
        }
        let coupling = self.tick(ctx, shared);
        self.handle.finish();
        coupling
    }

    /// Cancel the pending timer and forget the in-flight cycle
    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        self.handle.cancel(timers);
        self.phase = GatingPhase::Dip;
    }

    /// Ramp straight to the configured base volume outside of any cycle.
    ///
    /// Used when settings change while gating is off.
    pub fn apply_base_volume<G: AudioGraphPort, R>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
        shared: &mut SharedModulationState,
    ) -> Option<Coupling> {
        let chain = ctx.chain().ok()?;
        let volume = ctx.config.volume;
        if !ctx.ramp(ParamRef::new(chain.gain, AudioParam::Gain), volume, ctx.tuning.ramp) {
            return None;
        }
        shared.set_current_volume(ctx.now, volume);
        Some(Coupling::VolumeChanged(volume))
    }

    fn tick<G: AudioGraphPort, R: RngCore>(
        &mut self,
        ctx: &mut TickContext<'_, G, R>,
        shared: &mut SharedModulationState,
    ) -> Option<Coupling> {
        let Ok(chain) = ctx.chain() else {
            trace!("gating tick skipped: graph not initialized");
            let retry = ctx.random.sample(ctx.config.gating_bounds());
            self.phase = GatingPhase::Dip;
            self.handle.schedule(ctx.timers, ctx.now, retry);
            return None;
        };
        let gain = ParamRef::new(chain.gain, AudioParam::Gain);
        let volume = ctx.config.volume;
        let ramp = ctx.tuning.ramp;

        match self.phase {
            GatingPhase::Dip if !ctx.config.enable_gating => {
                debug!("gating disabled, holding volume at {:.2}", volume);
                self.apply_base_volume(ctx, shared)
            }
            GatingPhase::Dip => {
                let period = ctx.random.sample(ctx.config.gating_bounds());
                let floor = ctx.tuning.volume_floor.min(volume);
                let level = ctx.random.between(floor, volume);
                self.period = period;
                if !ctx.ramp(gain, level, ramp) {
                    // Skip this dip; the next cycle starts on the usual gap
                    let gap = period * ctx.random.sample(ctx.tuning.gating_cycle_multiplier);
                    self.handle.schedule(ctx.timers, ctx.now, gap);
                    return None;
                }
                shared.set_current_volume(ctx.now, level);

                self.phase = GatingPhase::Release;
                let dwell = period * ctx.tuning.gating_dwell;
                self.handle.schedule(ctx.timers, ctx.now, dwell);
                trace!("gate dip to {:.2} for {:.2}s", level, dwell);
                Some(Coupling::VolumeChanged(level))
            }
            GatingPhase::Release => {
                self.phase = GatingPhase::Dip;
                let coupling = if ctx.ramp(gain, volume, ramp) {
                    shared.set_current_volume(ctx.now, volume);
                    Some(Coupling::VolumeChanged(volume))
                } else {
                    None
                };
                // A cycle already in flight finishes, but a disabled gate starts no new one
                if ctx.config.enable_gating {
                    let gap = self.period * ctx.random.sample(ctx.tuning.gating_cycle_multiplier);
                    self.handle.schedule(ctx.timers, ctx.now, gap);
                }
                coupling
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModulationConfig;
    use crate::modulators::testing::Rig;
    use crate::state::INITIAL_VOLUME;
    use approx::assert_relative_eq;

    fn config() -> ModulationConfig {
        ModulationConfig {
            gating_min: 1.0,
            gating_max: 5.0,
            volume: 0.8,
            enable_gating: true,
            ..Default::default()
        }
    }

    fn gain_targets(rig: &Rig) -> Vec<f64> {
        rig.graph
            .ramp_targets(ParamRef::new(rig.main().gain, AudioParam::Gain))
    }

    #[test]
    fn test_dip_writes_current_volume() {
        let mut rig = Rig::new(config());
        let mut gating = GatingModulator::new();

        let (mut ctx, shared) = rig.split();
        let coupling = gating.fire(None, &mut ctx, shared);

        let level = rig.shared.current_volume();
        assert!((0.1..=0.8).contains(&level), "level {}", level);
        assert_eq!(coupling, Some(Coupling::VolumeChanged(level)));
        assert_eq!(gain_targets(&rig), vec![level]);
        assert_eq!(gating.phase(), GatingPhase::Release);
        assert!((1.0..=5.0).contains(&gating.period()));
    }

    #[test]
    fn test_release_returns_to_base_volume() {
        let mut rig = Rig::new(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);
        let period = gating.period();

        let id = rig.next_timer().unwrap();
        assert_relative_eq!(rig.graph.now(), period * 0.5, epsilon = 1e-9);

        let (mut ctx, shared) = rig.split();
        let coupling = gating.fire(Some(id), &mut ctx, shared);

        assert_eq!(coupling, Some(Coupling::VolumeChanged(0.8)));
        assert_eq!(rig.shared.current_volume(), 0.8);
        assert_eq!(gating.phase(), GatingPhase::Dip);

        // Next dip waits between 1x and 2x the period
        let due = rig.timers.next_due().unwrap();
        let gap = due - rig.graph.now();
        assert!(gap >= period - 1e-9 && gap <= 2.0 * period + 1e-9);
        assert_eq!(rig.timers.pending_for(LoopKind::Gating), 1);
    }

    #[test]
    fn test_volume_never_reaches_silence() {
        let mut rig = Rig::new(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);

        for _ in 0..200 {
            let id = rig.next_timer().unwrap();
            let (mut ctx, shared) = rig.split();
            gating.fire(Some(id), &mut ctx, shared);
            assert!(rig.shared.current_volume() >= 0.1);
        }
    }

    #[test]
    fn test_disabling_mid_cycle_finishes_release_only() {
        let mut rig = Rig::new(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);

        rig.config.enable_gating = false;
        let id = rig.next_timer().unwrap();
        let (mut ctx, shared) = rig.split();
        gating.fire(Some(id), &mut ctx, shared);

        assert_eq!(rig.shared.current_volume(), 0.8);
        assert!(rig.timers.is_empty());
        assert!(gating.handle().is_idle());
    }

    #[test]
    fn test_disabled_holds_base_volume() {
        let mut rig = Rig::new(ModulationConfig {
            enable_gating: false,
            volume: 0.6,
            ..config()
        });
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);

        assert_eq!(gain_targets(&rig), vec![0.6]);
        assert_eq!(rig.shared.current_volume(), 0.6);
        assert!(rig.timers.is_empty());
    }

    #[test]
    fn test_volume_below_floor() {
        let mut rig = Rig::new(ModulationConfig {
            volume: 0.05,
            ..config()
        });
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);
        assert_eq!(rig.shared.current_volume(), 0.05);
    }

    #[test]
    fn test_cancel_resets_cycle() {
        let mut rig = Rig::new(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);
        assert_eq!(gating.phase(), GatingPhase::Release);

        gating.cancel(&mut rig.timers);
        assert_eq!(gating.phase(), GatingPhase::Dip);
        assert!(rig.timers.is_empty());
    }

    #[test]
    fn test_failed_dip_keeps_cycle_alive() {
        let mut rig = Rig::failing(config());
        rig.graph.fail_ramps(Some(AudioParam::Gain), 1);
        let mut gating = GatingModulator::new();

        let (mut ctx, shared) = rig.split();
        assert_eq!(gating.fire(None, &mut ctx, shared), None);
        assert_eq!(rig.graph.failures_left(), 0);
        assert_eq!(rig.shared.current_volume(), INITIAL_VOLUME);
        assert_eq!(gating.phase(), GatingPhase::Dip);
        assert_eq!(rig.timers.pending_for(LoopKind::Gating), 1);

        let period = gating.period();
        let gap = rig.timers.next_due().unwrap() - rig.graph.now();
        assert!(gap >= period - 1e-9 && gap <= 2.0 * period + 1e-9);

        // The next cycle dips normally
        let id = rig.next_timer().unwrap();
        let (mut ctx, shared) = rig.split();
        let coupling = gating.fire(Some(id), &mut ctx, shared);
        assert!(matches!(coupling, Some(Coupling::VolumeChanged(_))));
        assert_eq!(gating.phase(), GatingPhase::Release);
        assert_eq!(rig.timers.pending_for(LoopKind::Gating), 1);
    }

    #[test]
    fn test_failed_release_still_schedules_next_dip() {
        let mut rig = Rig::failing(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        gating.fire(None, &mut ctx, shared);
        let dipped = rig.shared.current_volume();

        rig.graph.fail_ramps(Some(AudioParam::Gain), 1);
        let id = rig.next_timer().unwrap();
        let (mut ctx, shared) = rig.split();
        assert_eq!(gating.fire(Some(id), &mut ctx, shared), None);

        assert_eq!(rig.shared.current_volume(), dipped);
        assert_eq!(gating.phase(), GatingPhase::Dip);
        assert_eq!(rig.timers.pending_for(LoopKind::Gating), 1);
    }

    #[test]
    fn test_uninitialized_graph_retries_later() {
        let mut rig = Rig::uninitialized(config());
        let mut gating = GatingModulator::new();
        let (mut ctx, shared) = rig.split();
        assert_eq!(gating.fire(None, &mut ctx, shared), None);

        assert!(rig.graph.commands().is_empty());
        assert_eq!(rig.timers.pending_for(LoopKind::Gating), 1);
        let retry = rig.timers.next_due().unwrap() - rig.graph.now();
        assert!((1.0..=5.0).contains(&retry), "retry {}", retry);
    }
}
