//! # Events emitted by the scheduler.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Registry events**: tasks entering or leaving the scheduler
//! - **Admission events**: suspend/resume/stall decisions and poll passes
//! - **Delivery events**: failures of the dispatch worker or subscribers
//!
//! ## Example
//! ```rust
//! use taskvalve::{Event, EventKind, TaskOp};
//!
//! let ev = Event::new(EventKind::TaskSuspended)
//!     .with_task("download-7")
//!     .with_op(TaskOp::Suspend)
//!     .with_reason("over_capacity");
//!
//! assert_eq!(ev.kind, EventKind::TaskSuspended);
//! assert_eq!(ev.task.as_deref(), Some("download-7"));
//! assert_eq!(ev.reason.as_deref(), Some("over_capacity"));
//! ```

use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

use crate::tasks::TaskOp;

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registry ===
    /// Task inserted into the registry.
    ///
    /// Sets: `task`
    TaskAdded,

    /// A tracked task was evicted because a task with the same id was added.
    ///
    /// Sets: `task`, `op` (`Cancel` if a cancel request was issued)
    TaskReplaced,

    /// Task canceled via `cancel` / `cancel_all`.
    ///
    /// Sets: `task`, `op` (`Cancel` if a cancel request was issued)
    TaskCanceled,

    /// Poll pass purged a task that reached a terminal state.
    ///
    /// Sets: `task`, `reason` (state label)
    TaskRemoved,

    // === Admission ===
    /// Suspend requested.
    ///
    /// Sets: `task`, `reason` (`administrative`, `over_capacity`, `stalled`), `op` if issued
    TaskSuspended,

    /// Task re-admitted (`administrative`) or woken by the poll pass (`admitted`).
    ///
    /// Sets: `task`, `reason`, `op` if issued
    TaskResumed,

    /// Running task did not advance within `timeout`.
    ///
    /// Sets: `task`
    TaskStalled,

    /// Task moved to the front of the running list.
    ///
    /// Sets: `task`
    TaskPrioritized,

    /// One poll pass finished.
    ///
    /// Sets: `poll`
    PollCompleted,

    /// Repeating poll clock armed.
    AutoPollStarted,

    /// Repeating poll clock disarmed.
    AutoPollStopped,

    // === Delivery ===
    /// Dispatch queue grew past `dispatch_capacity`; requests are still delivered.
    ///
    /// Sets: `task`, `op` (of the request that crossed the limit), `reason`
    DispatchBacklog,

    /// A task callback panicked inside the dispatch worker.
    ///
    /// Sets: `task`, `op`, `reason`
    DispatchPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Counters produced by a single poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Tasks counted against the running budget.
    pub running: usize,
    /// Suspend requests issued (over capacity or stalled).
    pub suspended: usize,
    /// Resume requests issued.
    pub resumed: usize,
    /// Terminal tasks purged.
    pub removed: usize,
}

/// Scheduler event with optional metadata.
///
/// - `seq`: monotonic sequence assigned by the publishing [`Bus`](super::Bus)
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Per-bus sequence number (0 until published).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Debug rendering of the task key, or a subscriber name.
    pub task: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Request issued to the task, if any.
    pub op: Option<TaskOp>,
    /// Poll pass counters.
    pub poll: Option<PollSummary>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            op: None,
            poll: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task key rendered with `Debug`.
    #[inline]
    pub fn with_key<K: Debug>(self, key: &K) -> Self {
        self.with_task(format!("{key:?}"))
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_op(mut self, op: TaskOp) -> Self {
        self.op = Some(op);
        self
    }

    /// Attaches `op` only when `issued` holds.
    #[inline]
    pub fn with_op_if(self, issued: bool, op: TaskOp) -> Self {
        if issued { self.with_op(op) } else { self }
    }

    #[inline]
    pub fn with_poll(mut self, summary: PollSummary) -> Self {
        self.poll = Some(summary);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events raised by the delivery machinery itself.
    #[inline]
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DispatchPanicked
                | EventKind::SubscriberOverflow
                | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_rendered_with_debug() {
        let ev = Event::new(EventKind::TaskAdded).with_key(&"a/b");
        assert_eq!(ev.task.as_deref(), Some("\"a/b\""));
        let ev = Event::new(EventKind::TaskAdded).with_key(&42u32);
        assert_eq!(ev.task.as_deref(), Some("42"));
    }

    #[test]
    fn op_is_attached_only_when_issued() {
        let ev = Event::new(EventKind::TaskCanceled).with_op_if(false, TaskOp::Cancel);
        assert!(ev.op.is_none());
        let ev = Event::new(EventKind::TaskCanceled).with_op_if(true, TaskOp::Cancel);
        assert_eq!(ev.op, Some(TaskOp::Cancel));
    }

    #[test]
    fn delivery_failures_are_classified() {
        assert!(Event::subscriber_overflow("log", "full").is_delivery_failure());
        assert!(!Event::new(EventKind::PollCompleted).is_delivery_failure());
    }
}
