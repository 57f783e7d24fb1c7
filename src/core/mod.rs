//! Runtime core: the admission-controlled poller.
//!
//! The only public API from this module is [`Scheduler`] and its
//! [`SchedulerBuilder`].
//!
//! Internal modules:
//! - [`scheduler`]: task partitions, the poll pass and the public operations;
//! - [`dispatch`]: worker that delivers `resume`/`suspend`/`cancel` outside the lock;
//! - [`extra`]: per-task stall bookkeeping;
//! - [`slot`]: single-slot timers for the auto-poll clock and the re-poll.

mod builder;
mod dispatch;
mod extra;
mod scheduler;
mod slot;

pub use builder::SchedulerBuilder;
pub use scheduler::Scheduler;
