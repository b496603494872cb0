//! Virtual Timer Queue
//!
//! Loops reschedule themselves through a single-threaded timer queue that the
//! host drains by advancing the audio clock. Timers are keyed by generational
//! slotmap keys, so a cancelled timer's id can never match a live one.
//!
//! Each loop owns a [`LoopHandle`] holding at most one outstanding timer.
//! Rescheduling always cancels the previous timer first.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Identifier of a pending timer
    pub struct TimerId;
}

/// Shortest delay a timer may be scheduled with (seconds)
pub const MIN_DELAY: f64 = 0.001;

/// The self-rescheduling loops driven by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Filter,
    Gating,
    Panning,
    PlaybackRate,
}

impl LoopKind {
    pub const ALL: [LoopKind; 4] = [
        LoopKind::Filter,
        LoopKind::Gating,
        LoopKind::Panning,
        LoopKind::PlaybackRate,
    ];
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due: f64,
    seq: u64,
    kind: LoopKind,
}

/// Pending timers ordered by due time, then by insertion
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: SlotMap<TimerId, Timer>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `delay` seconds after `now`
    pub fn schedule(&mut self, now: f64, delay: f64, kind: LoopKind) -> TimerId {
        let delay = if delay.is_finite() {
            delay.max(MIN_DELAY)
        } else {
            MIN_DELAY
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(Timer {
            due: now + delay,
            seq,
            kind,
        })
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(id).is_some()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    pub fn due_time(&self, id: TimerId) -> Option<f64> {
        self.timers.get(id).map(|t| t.due)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Number of pending timers for one loop
    pub fn pending_for(&self, kind: LoopKind) -> usize {
        self.timers.values().filter(|t| t.kind == kind).count()
    }

    /// Earliest due time of any pending timer
    pub fn next_due(&self) -> Option<f64> {
        self.timers.values().map(|t| t.due).reduce(f64::min)
    }

    /// Remove and return the earliest timer due at or before `now`
    pub fn pop_due(&mut self, now: f64) -> Option<(TimerId, LoopKind)> {
        let (id, timer) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
            .map(|(id, t)| (id, *t))?;
        self.timers.remove(id);
        Some((id, timer.kind))
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

/// Where a loop is in its schedule/tick cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// No timer pending; the chain is not running
    Idle,
    /// Exactly one timer pending
    Scheduled,
    /// A tick is executing
    Running,
}

/// A loop's single cancellable timer
#[derive(Debug, Clone)]
pub struct LoopHandle {
    kind: LoopKind,
    timer: Option<TimerId>,
    state: LoopState,
}

impl LoopHandle {
    pub fn new(kind: LoopKind) -> Self {
        Self {
            kind,
            timer: None,
            state: LoopState::Idle,
        }
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn is_idle(&self) -> bool {
        self.state == LoopState::Idle
    }

    /// Cancel any pending timer, then schedule a new one
    pub fn schedule(&mut self, timers: &mut TimerQueue, now: f64, delay: f64) -> TimerId {
        if let Some(old) = self.timer.take() {
            timers.cancel(old);
        }
        let id = timers.schedule(now, delay, self.kind);
        self.timer = Some(id);
        self.state = LoopState::Scheduled;
        id
    }

    /// Cancel the pending timer and go idle
    pub fn cancel(&mut self, timers: &mut TimerQueue) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
        self.state = LoopState::Idle;
    }

    /// Claim a fired timer. A timer that is not this handle's current one is stale.
    pub fn begin(&mut self, fired: TimerId) -> bool {
        if self.timer != Some(fired) {
            return false;
        }
        self.timer = None;
        self.state = LoopState::Running;
        true
    }

    /// Enter a tick, either for a fired timer or (`None`) for an immediate run.
    ///
    /// An immediate run cancels whatever timer was pending so the tick's own
    /// reschedule remains the only one.
    pub fn claim(&mut self, fired: Option<TimerId>, timers: &mut TimerQueue) -> bool {
        match fired {
            Some(id) => self.begin(id),
            None => {
                self.cancel(timers);
                self.state = LoopState::Running;
                true
            }
        }
    }

    /// End a tick. If the tick did not reschedule, the chain is over.
    pub fn finish(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Idle;
        }
    }
}
