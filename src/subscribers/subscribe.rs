//! # Scheduler event subscriber.
//!
//! A [`Subscribe`] implementation observes what a [`Scheduler`](crate::Scheduler)
//! decides: admissions, stall suspensions, removals and poll passes. It is
//! driven by its own worker, fed through a bounded queue owned by the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## What arrives
//! | Source            | Kinds                                                                  |
//! |-------------------|------------------------------------------------------------------------|
//! | registry changes  | `TaskAdded`, `TaskReplaced`, `TaskCanceled`, `TaskRemoved`             |
//! | admission         | `TaskResumed`, `TaskSuspended`, `TaskStalled`, `TaskPrioritized`       |
//! | polling           | `PollCompleted` (one per non-empty pass), `AutoPollStarted`/`Stopped`  |
//! | delivery          | `DispatchBacklog`, `DispatchPanicked`, `SubscriberOverflow`/`Panicked` |
//!
//! ## Contract
//! - Events arrive in bus order (`seq` ascending) but may have gaps: a full
//!   queue drops the event for this subscriber only and publishes
//!   `SubscriberOverflow`.
//! - `PollCompleted` is the chattiest kind (one per pass, every `interval`
//!   while tasks are tracked); size [`queue_capacity`](Subscribe::queue_capacity)
//!   for it.
//! - A panic inside `on_event` is caught and reported as `SubscriberPanicked`;
//!   the worker keeps running.

use async_trait::async_trait;

use crate::events::Event;

/// Observer of scheduler events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Must not call back into the scheduler synchronously
    /// in a way that waits on this subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events and logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth before events are dropped for this subscriber.
    fn queue_capacity(&self) -> usize {
        256
    }
}
