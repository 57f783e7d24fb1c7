//! # Scheduler and valve configuration.
//!
//! Provides [`SchedulerConfig`] with the admission/stall knobs of a
//! [`Scheduler`](crate::Scheduler), plus [`MergeConfig`] and [`LimitConfig`]
//! for the standalone valves.
//!
//! ## Sentinel values
//! - `max_activations = 0` → nothing is ever admitted (every running task is suspended)
//! - `bus_capacity` / `dispatch_capacity` below 1 are clamped to 1
//! - `interval = 0` is rejected by [`SchedulerConfig::validate`]

use std::time::Duration;

use crate::error::RuntimeError;

/// Where newly added tasks enter the running list.
///
/// List order is the only admission priority: earlier entries are
/// evaluated, and admitted, first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Policy {
    /// Append to the back (oldest first).
    #[default]
    Fifo,
    /// Insert at the front (newest first).
    Lifo,
}

/// Configuration of a [`Scheduler`](crate::Scheduler).
///
/// ## Field semantics
/// - `max_activations`: concurrency cap on tasks kept running
/// - `timeout`: how long a running task may go without advancing before it is stall-suspended
/// - `duration_of_suspension`: how long a stall-suspended task is held before reconsideration
/// - `interval`: auto-poll period and delay of the self-scheduled re-poll
/// - `policy`: insertion order for `add`
/// - `auto_poll`: start with the repeating poll clock enabled
/// - `bus_capacity`: event bus ring buffer size
/// - `dispatch_capacity`: soft limit on queued task callbacks; crossing it publishes `DispatchBacklog`
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub max_activations: usize,
    pub timeout: Duration,
    pub duration_of_suspension: Duration,
    pub interval: Duration,
    pub policy: Policy,
    pub auto_poll: bool,
    pub bus_capacity: usize,
    pub dispatch_capacity: usize,
}

impl SchedulerConfig {
    /// Checks that the configuration can drive a poll clock.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        RuntimeError::require_period("interval", self.interval)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a dispatch queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn dispatch_capacity_clamped(&self) -> usize {
        self.dispatch_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `max_activations = 8`
    /// - `timeout = 60s`
    /// - `duration_of_suspension = 30s`
    /// - `interval = 100ms`
    /// - `policy = Policy::Fifo`
    /// - `auto_poll = false`
    /// - `bus_capacity = 1024`, `dispatch_capacity = 1024`
    fn default() -> Self {
        Self {
            max_activations: 8,
            timeout: Duration::from_secs(60),
            duration_of_suspension: Duration::from_secs(30),
            interval: Duration::from_millis(100),
            policy: Policy::Fifo,
            auto_poll: false,
            bus_capacity: 1024,
            dispatch_capacity: 1024,
        }
    }
}

/// Configuration of a [`Merge`](crate::valve::Merge) valve.
#[derive(Clone, Copy, Debug)]
pub struct MergeConfig {
    /// Delay between the first pending value and the flush (`0` = next tick).
    pub interval: Duration,
    /// Buffer size that triggers an immediate flush.
    pub max_merge_count: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_merge_count: 100,
        }
    }
}

/// Configuration of a [`Limit`](crate::valve::Limit) valve.
#[derive(Clone, Copy, Debug)]
pub struct LimitConfig {
    /// Emission period; must be non-zero.
    pub interval: Duration,
}

impl LimitConfig {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        RuntimeError::require_period("interval", self.interval)
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}
