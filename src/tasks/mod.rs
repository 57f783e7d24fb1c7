//! # Task abstraction consumed by the scheduler.
//!
//! - [`Task`] - capability trait for an externally driven unit of work
//! - [`TaskState`] - coarse lifecycle state observed by the poller
//! - [`TaskOp`] - fire-and-forget request issued back to a task

mod state;
mod task;

#[cfg(test)]
pub(crate) mod mock;

pub use state::{TaskOp, TaskState};
pub use task::{DEFAULT_PRIORITY, Task};
pub(crate) use task::observed_progress;
