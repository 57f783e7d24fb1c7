//! # Single-slot timer.
//!
//! A [`TimerSlot`] holds at most one armed timer. Arming replaces the
//! previous timer; disarming cancels it. The scheduler keeps one slot for
//! its repeating auto-poll clock and one for the self-scheduled re-poll.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owner of at most one pending timer.
#[derive(Default)]
pub(crate) struct TimerSlot {
    token: Option<CancellationToken>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a timer is armed and has not fired (one-shot) or been disarmed.
    pub fn is_armed(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Cancels the armed timer, if any. Returns whether one was armed.
    pub fn disarm(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                let was_armed = !token.is_cancelled();
                token.cancel();
                was_armed
            }
            None => false,
        }
    }

    /// Runs `f` once after `delay`, replacing any armed timer.
    pub fn arm_once<F>(&mut self, rt: &Handle, parent: &CancellationToken, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.rearm(parent);
        rt.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    token.cancel();
                    f();
                }
            }
        });
    }

    /// Runs `f` every `period` (first run one period from now), replacing any armed timer.
    pub fn arm_repeating<F>(&mut self, rt: &Handle, parent: &CancellationToken, period: Duration, f: F)
    where
        F: Fn() + Send + 'static,
    {
        let token = self.rearm(parent);
        rt.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f(),
                }
            }
        });
    }

    fn rearm(&mut self, parent: &CancellationToken) -> CancellationToken {
        self.disarm();
        let token = parent.child_token();
        self.token = Some(token.clone());
        token
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}
