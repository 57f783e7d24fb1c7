//! # Limit valve: throttle/drip.
//!
//! ```text
//! add(a) add(b) add(c)          tick        tick        tick
//!    │      │      │             │           │           │
//!    └──────┴──────┴─► [a b c] ──┴─► action(a)┴─► action(b)┴─► action(c) ─► clock idle
//! ```
//!
//! ## Rules
//! - Values are delivered FIFO, at most one per `interval`.
//! - The clock starts on the first `add` into an idle valve; the first value
//!   is delivered one `interval` later.
//! - The clock stops as soon as the buffer drains: no ticking while idle.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::LimitConfig;
use crate::error::{RuntimeError, current_runtime};

type LimitAction<V> = Box<dyn Fn(V) + Send + Sync>;

/// Emits buffered values one at a time on a fixed period.
pub struct Limit<V> {
    inner: Arc<LimitInner<V>>,
}

impl<V> Clone for Limit<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LimitInner<V> {
    cfg: LimitConfig,
    action: LimitAction<V>,
    buf: Mutex<Drip<V>>,
    rt: Handle,
    token: CancellationToken,
}

struct Drip<V> {
    objects: VecDeque<V>,
    /// Clock is armed.
    running: bool,
}

impl<V: Send + 'static> Limit<V> {
    /// Creates a limit valve on the current tokio runtime.
    ///
    /// Fails if `cfg.interval` is zero.
    pub fn new<F>(cfg: LimitConfig, action: F) -> Result<Self, RuntimeError>
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        cfg.validate()?;
        let rt = current_runtime()?;
        Ok(Self {
            inner: Arc::new(LimitInner {
                cfg,
                action: Box::new(action),
                buf: Mutex::new(Drip {
                    objects: VecDeque::new(),
                    running: false,
                }),
                rt,
                token: CancellationToken::new(),
            }),
        })
    }

    /// Queues `value` for delivery, starting the clock if it is idle.
    pub fn add(&self, value: V) {
        let mut buf = self.inner.buf.lock();
        if buf.objects.is_empty() && !buf.running {
            buf.running = true;
            self.inner.start_clock();
        }
        buf.objects.push_back(value);
    }

    /// Number of values not yet delivered.
    pub fn pending(&self) -> usize {
        self.inner.buf.lock().objects.len()
    }

    /// True while the clock is armed.
    pub fn is_running(&self) -> bool {
        self.inner.buf.lock().running
    }
}

impl<V: Send + 'static> LimitInner<V> {
    fn start_clock(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.token.clone();
        let period = self.cfg.interval;

        self.rt.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        if !inner.tick() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Delivers the oldest value. Returns whether the clock keeps running.
    fn tick(&self) -> bool {
        let mut buf = self.buf.lock();
        let Some(value) = buf.objects.pop_front() else {
            buf.running = false;
            return false;
        };
        if buf.objects.is_empty() {
            buf.running = false;
        }
        trace!(left = buf.objects.len(), "limit tick");
        (self.action)(value);
        buf.running
    }
}

impl<V> Drop for LimitInner<V> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recording() -> (Limit<u32>, Arc<Mutex<Vec<(u32, Instant)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let limit = Limit::new(LimitConfig::default(), move |v| {
            sink.lock().push((v, Instant::now()));
        })
        .unwrap();
        (limit, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn drips_one_value_per_tick_in_fifo_order() {
        let (limit, seen) = recording();
        assert!(!limit.is_running());

        let start = Instant::now();
        for v in 1..=3 {
            limit.add(v);
        }
        assert!(limit.is_running());
        assert_eq!(limit.pending(), 3);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let seen = seen.lock();
        let values: Vec<u32> = seen.iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![1, 2, 3]);
        for (i, (_, at)) in seen.iter().enumerate() {
            assert_eq!(*at - start, Duration::from_millis(100 * (i as u64 + 1)));
        }
        assert!(!limit.is_running());
        assert_eq!(limit.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_going_idle() {
        let (limit, seen) = recording();
        limit.add(1);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!limit.is_running());

        limit.add(2);
        assert!(limit.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        let values: Vec<u32> = seen.lock().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![1, 2]);
        assert!(!limit.is_running());
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let cfg = LimitConfig {
            interval: Duration::ZERO,
        };
        assert!(Limit::new(cfg, |_: u32| {}).is_err());
    }
}
