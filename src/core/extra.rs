//! Per-task bookkeeping kept by the poll pass.

use std::time::Duration;

use tokio::time::Instant;

/// Stall and wake-up state of one tracked task.
///
/// Created on the first poll that observes the task, dropped with the task.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Extra {
    /// When the task was stall-suspended; `None` if never (or since woken).
    pub suspend_time: Option<Instant>,
    /// Last time progress advanced past `last_progress`.
    pub update_at: Instant,
    /// Best progress recorded since the last baseline.
    pub last_progress: f64,
}

impl Extra {
    pub fn new(now: Instant) -> Self {
        Self {
            suspend_time: None,
            update_at: now,
            last_progress: 0.0,
        }
    }

    /// True if `progress` has not advanced past the recorded value for longer than `timeout`.
    ///
    /// A repeated reading counts as not advanced (`<=`, not `<`): a task stuck
    /// at the same value must stall out, not only one that regresses.
    pub fn is_stalled(&self, progress: f64, now: Instant, timeout: Duration) -> bool {
        progress <= self.last_progress && now.saturating_duration_since(self.update_at) > timeout
    }

    /// Records a reading; only an advance refreshes the baseline.
    pub fn observe(&mut self, progress: f64, now: Instant) {
        if progress > self.last_progress {
            self.last_progress = progress;
            self.update_at = now;
        }
    }

    /// True if the task may be resumed: never stall-suspended, or held for longer than `hold`.
    pub fn may_wake(&self, now: Instant, hold: Duration) -> bool {
        match self.suspend_time {
            None => true,
            Some(at) => now.saturating_duration_since(at) > hold,
        }
    }

    /// Starts a fresh stall window at `progress`.
    pub fn rebaseline(&mut self, progress: f64, now: Instant) {
        self.update_at = now;
        self.suspend_time = None;
        self.last_progress = progress;
    }
}
