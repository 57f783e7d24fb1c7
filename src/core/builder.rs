use std::marker::PhantomData;
use std::sync::Arc;

use super::scheduler::Scheduler;
use crate::config::SchedulerConfig;
use crate::error::RuntimeError;
use crate::subscribers::Subscribe;
use crate::tasks::Task;

/// Builder for constructing a [`Scheduler`] with optional subscribers.
pub struct SchedulerBuilder<T: Task + ?Sized> {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    _task: PhantomData<fn() -> Arc<T>>,
}

impl<T: Task + ?Sized> SchedulerBuilder<T> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            _task: PhantomData,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive scheduler events (admission, stalls, removals, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the scheduler on the current tokio runtime.
    ///
    /// Starts the dispatch worker, the subscriber workers and, if
    /// `auto_poll` is set, the repeating poll clock.
    pub fn build(self) -> Result<Scheduler<T>, RuntimeError> {
        Scheduler::start(self.cfg, self.subscribers)
    }
}
