//! # Scheduler: admission-controlled poller.
//!
//! The [`Scheduler`] tracks tasks, keeps at most `max_activations` of them
//! running, suspends tasks whose progress stalls, and wakes suspended tasks
//! when a slot frees up. It never performs the work itself: it only reads
//! [`Task::state`]/[`Task::progress`] and sends `resume`/`suspend`/`cancel`
//! requests through its dispatch worker.
//!
//! ## Architecture
//! ```text
//! add / suspend / resume / cancel / prioritize ──► State (parking_lot::Mutex)
//!                                                   ├─ all_tasks     id → task (registry)
//!                                                   ├─ running_tasks ordered; order = admission priority
//!                                                   ├─ suspend_tasks administratively suspended
//!                                                   └─ extras        id → Extra (stall bookkeeping)
//!
//! manual_poll() ──► Merge valve (coalesce) ──► spawn poll()
//! auto clock    ──────────────────────────────► poll()
//! poll() ──► Dispatcher ──► task.resume()/suspend()/cancel()   (outside the lock)
//!   └─ auto_poll off ─► re-poll slot (one pending re-poll) ──► manual_poll()
//! ```
//!
//! ## Poll pass
//! One left-to-right pass over `running_tasks` with a shared running budget:
//! ```text
//! for task in running_tasks:
//!   Running   ─► stalled or budget spent ─► suspend (stamp suspend_time if stalled)
//!              └► otherwise              ─► count toward budget
//!   Suspended ─► wake-eligible and budget left ─► resume, count, rebaseline
//!   Canceling/Completed ─► purge
//! ```
//!
//! ## Rules
//! - A task id is in at most one of `running_tasks` / `suspend_tasks`.
//! - Adding a task whose id is tracked evicts (and cancels) the old one first.
//! - `cancel()` is never sent to a task already canceling or completed.
//! - No operation fails; unknown ids are ignored.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::builder::SchedulerBuilder;
use super::dispatch::Dispatcher;
use super::extra::Extra;
use super::slot::TimerSlot;
use crate::config::{MergeConfig, Policy, SchedulerConfig};
use crate::error::{RuntimeError, current_runtime};
use crate::events::{Bus, Event, EventKind, PollSummary};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{Task, TaskOp, TaskState, observed_progress};
use crate::valve::Merge;

/// Poll requests collected within one tick are merged into a single pass.
const POLL_COALESCE: MergeConfig = MergeConfig {
    interval: Duration::ZERO,
    max_merge_count: 100,
};

/// Admission-controlled task scheduler.
///
/// Cheap to clone; all clones drive the same scheduler. Background timers
/// and the dispatch worker stop once the last clone is dropped.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use taskvalve::{Policy, Scheduler, SchedulerConfig, Task, TaskState};
///
/// struct Job { id: u32, state: Mutex<TaskState> }
///
/// impl Task for Job {
///     type Key = u32;
///     fn id(&self) -> u32 { self.id }
///     fn state(&self) -> TaskState { *self.state.lock() }
///     fn progress(&self) -> f64 { 0.0 }
///     fn resume(&self) { *self.state.lock() = TaskState::Running; }
///     fn suspend(&self) { *self.state.lock() = TaskState::Suspended; }
///     fn cancel(&self) { *self.state.lock() = TaskState::Canceling; }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), taskvalve::RuntimeError> {
///     let mut cfg = SchedulerConfig::default();
///     cfg.max_activations = 2;
///     cfg.policy = Policy::Fifo;
///     let sched = Scheduler::<Job>::new(cfg)?;
///
///     sched.add((1..=3).map(|id| Arc::new(Job { id, state: Mutex::new(TaskState::Suspended) })));
///     sched.manual_poll();
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///     // Jobs 1 and 2 were resumed; job 3 waits for a free slot.
///     Ok(())
/// }
/// ```
pub struct Scheduler<T: Task + ?Sized> {
    inner: Arc<Inner<T>>,
}

impl<T: Task + ?Sized> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<T: Task + ?Sized> {
    state: Mutex<State<T>>,
    bus: Bus,
    dispatcher: Dispatcher<T>,
    valve: Merge<u64, u64>,
    poll_requests: AtomicU64,
    rt: Handle,
    token: CancellationToken,
}

struct State<T: Task + ?Sized> {
    cfg: SchedulerConfig,
    all_tasks: HashMap<T::Key, Arc<T>>,
    running_tasks: Vec<Arc<T>>,
    suspend_tasks: Vec<Arc<T>>,
    extras: HashMap<T::Key, Extra>,
    auto_clock: TimerSlot,
    repoll: TimerSlot,
}

impl<T: Task + ?Sized> Scheduler<T> {
    /// Returns a builder for attaching subscribers before start.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder<T> {
        SchedulerBuilder::new(cfg)
    }

    /// Creates a scheduler without subscribers on the current tokio runtime.
    pub fn new(cfg: SchedulerConfig) -> Result<Self, RuntimeError> {
        Self::start(cfg, Vec::new())
    }

    pub(crate) fn start(
        cfg: SchedulerConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, RuntimeError> {
        cfg.validate()?;
        let rt = current_runtime()?;
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !subscribers.is_empty() {
            let set = SubscriberSet::new(subscribers, bus.clone(), &rt);
            subscriber_listener(&rt, &bus, token.clone(), set);
        }

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<T>>| {
            let poll_target = weak.clone();
            let poll_rt = rt.clone();
            let valve = Merge::<u64, u64>::on_runtime(rt.clone(), POLL_COALESCE, move |_, _| {
                let target = poll_target.clone();
                poll_rt.spawn(async move {
                    if let Some(inner) = target.upgrade() {
                        inner.poll();
                    }
                });
            });

            Inner {
                dispatcher: Dispatcher::spawn(cfg.dispatch_capacity_clamped(), bus.clone(), &rt),
                state: Mutex::new(State {
                    cfg: cfg.clone(),
                    all_tasks: HashMap::new(),
                    running_tasks: Vec::new(),
                    suspend_tasks: Vec::new(),
                    extras: HashMap::new(),
                    auto_clock: TimerSlot::new(),
                    repoll: TimerSlot::new(),
                }),
                bus,
                valve,
                poll_requests: AtomicU64::new(0),
                rt,
                token,
            }
        });

        if cfg.auto_poll {
            let mut st = inner.state.lock();
            inner.arm_auto_clock(&mut st);
        }
        Ok(Self { inner })
    }

    /// Adds tasks, evicting (and canceling) any tracked task with the same id.
    ///
    /// New tasks enter the running list at the back (`Fifo`) or, as a batch
    /// in the given order, at the front (`Lifo`). They are resumed by the
    /// next poll pass if a slot is free.
    pub fn add<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Arc<T>>,
    {
        let inner = &self.inner;
        let mut st = inner.state.lock();
        let mut admitted: Vec<Arc<T>> = Vec::new();

        for task in tasks {
            let id = task.id();
            admitted.retain(|t| t.id() != id);
            for old in st.evict(&id) {
                let issued = inner.cancel_request(&old);
                inner.bus.publish(
                    Event::new(EventKind::TaskReplaced)
                        .with_key(&id)
                        .with_op_if(issued, TaskOp::Cancel),
                );
            }
            st.all_tasks.insert(id.clone(), Arc::clone(&task));
            inner
                .bus
                .publish(Event::new(EventKind::TaskAdded).with_key(&id));
            admitted.push(task);
        }

        match st.cfg.policy {
            Policy::Fifo => st.running_tasks.extend(admitted),
            Policy::Lifo => {
                admitted.append(&mut st.running_tasks);
                st.running_tasks = admitted;
            }
        }
    }

    /// Moves matching running tasks to the suspended partition.
    ///
    /// `suspend()` is requested only from tasks currently reporting `Running`.
    pub fn suspend(&self, ids: &[T::Key]) {
        let wanted: HashSet<T::Key> = ids.iter().cloned().collect();
        let inner = &self.inner;
        let mut st = inner.state.lock();

        let (changes, keep): (Vec<_>, Vec<_>) = st
            .running_tasks
            .drain(..)
            .partition(|t| wanted.contains(&t.id()));
        st.running_tasks = keep;

        for task in &changes {
            let issued = task.state() == TaskState::Running && inner.dispatch(task, TaskOp::Suspend);
            inner.bus.publish(
                Event::new(EventKind::TaskSuspended)
                    .with_key(&task.id())
                    .with_reason("administrative")
                    .with_op_if(issued, TaskOp::Suspend),
            );
        }
        st.suspend_tasks.extend(changes);
    }

    /// Re-admits matching suspended tasks at the back of the running list.
    ///
    /// No `resume()` is sent here; the next poll pass resumes them when a slot
    /// is free. A pending stall hold is lifted, so that pass does not wait out
    /// `duration_of_suspension`.
    pub fn resume(&self, ids: &[T::Key]) {
        let wanted: HashSet<T::Key> = ids.iter().cloned().collect();
        let inner = &self.inner;
        let mut st = inner.state.lock();

        let (changes, keep): (Vec<_>, Vec<_>) = st
            .suspend_tasks
            .drain(..)
            .partition(|t| wanted.contains(&t.id()));
        st.suspend_tasks = keep;

        for task in &changes {
            if let Some(extra) = st.extras.get_mut(&task.id()) {
                extra.suspend_time = None;
            }
            inner.bus.publish(
                Event::new(EventKind::TaskResumed)
                    .with_key(&task.id())
                    .with_reason("administrative"),
            );
        }
        st.running_tasks.extend(changes);
    }

    /// Cancels matching tasks and stops tracking them, whatever their state.
    pub fn cancel(&self, ids: &[T::Key]) {
        let inner = &self.inner;
        let mut st = inner.state.lock();
        for id in ids {
            for task in st.evict(id) {
                let issued = inner.cancel_request(&task);
                inner.bus.publish(
                    Event::new(EventKind::TaskCanceled)
                        .with_key(id)
                        .with_op_if(issued, TaskOp::Cancel),
                );
            }
        }
    }

    /// Cancels every tracked task and clears all partitions.
    pub fn cancel_all(&self) {
        let inner = &self.inner;
        let mut st = inner.state.lock();
        let ids: Vec<T::Key> = st.tracked_ids();
        for id in &ids {
            for task in st.evict(id) {
                let issued = inner.cancel_request(&task);
                inner.bus.publish(
                    Event::new(EventKind::TaskCanceled)
                        .with_key(id)
                        .with_op_if(issued, TaskOp::Cancel),
                );
            }
        }
        st.extras.clear();
    }

    /// Moves matching running tasks to the front, keeping their relative order.
    pub fn prioritize(&self, ids: &[T::Key]) {
        let wanted: HashSet<T::Key> = ids.iter().cloned().collect();
        let inner = &self.inner;
        let mut st = inner.state.lock();

        let (mut front, rest): (Vec<_>, Vec<_>) = st
            .running_tasks
            .drain(..)
            .partition(|t| wanted.contains(&t.id()));
        for task in &front {
            inner
                .bus
                .publish(Event::new(EventKind::TaskPrioritized).with_key(&task.id()));
        }
        front.extend(rest);
        st.running_tasks = front;
    }

    /// Requests a poll pass. Requests made within the same tick collapse into one.
    pub fn manual_poll(&self) {
        self.inner.manual_poll();
    }

    /// True while the repeating poll clock drives polling.
    pub fn auto_poll(&self) -> bool {
        self.inner.state.lock().cfg.auto_poll
    }

    /// Starts or stops the repeating poll clock.
    ///
    /// Disabling it does not poll; call [`manual_poll`](Self::manual_poll)
    /// to restart request-driven polling.
    pub fn set_auto_poll(&self, enabled: bool) {
        let inner = &self.inner;
        let mut st = inner.state.lock();
        if st.cfg.auto_poll == enabled {
            return;
        }
        st.cfg.auto_poll = enabled;
        if enabled {
            st.repoll.disarm();
            inner.arm_auto_clock(&mut st);
        } else {
            st.auto_clock.disarm();
            inner
                .bus
                .publish(Event::new(EventKind::AutoPollStopped));
        }
    }

    /// Returns the registered task for `id`.
    pub fn get(&self, id: &T::Key) -> Option<Arc<T>> {
        self.inner.state.lock().all_tasks.get(id).cloned()
    }

    /// Replaces (or, with `None`, removes) the registry entry for `id`.
    ///
    /// Partition membership and bookkeeping are left untouched.
    pub fn replace(&self, id: T::Key, task: Option<Arc<T>>) -> Option<Arc<T>> {
        let mut st = self.inner.state.lock();
        match task {
            Some(task) => st.all_tasks.insert(id, task),
            None => st.all_tasks.remove(&id),
        }
    }

    /// True if `id` is in the registry.
    pub fn contains(&self, id: &T::Key) -> bool {
        self.inner.state.lock().all_tasks.contains_key(id)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.state.lock().all_tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the running list, in admission order.
    pub fn running_tasks(&self) -> Vec<Arc<T>> {
        self.inner.state.lock().running_tasks.clone()
    }

    /// Snapshot of the administratively suspended tasks.
    pub fn suspended_tasks(&self) -> Vec<Arc<T>> {
        self.inner.state.lock().suspend_tasks.clone()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> SchedulerConfig {
        self.inner.state.lock().cfg.clone()
    }

    pub fn set_max_activations(&self, max_activations: usize) {
        self.inner.state.lock().cfg.max_activations = max_activations;
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.state.lock().cfg.timeout = timeout;
    }

    pub fn set_duration_of_suspension(&self, hold: Duration) {
        self.inner.state.lock().cfg.duration_of_suspension = hold;
    }

    /// Changes the insertion policy for subsequent `add` calls.
    pub fn set_policy(&self, policy: Policy) {
        self.inner.state.lock().cfg.policy = policy;
    }

    /// Changes the poll period, rearming the auto-poll clock if it runs.
    pub fn set_interval(&self, interval: Duration) -> Result<(), RuntimeError> {
        RuntimeError::require_period("interval", interval)?;
        let inner = &self.inner;
        let mut st = inner.state.lock();
        st.cfg.interval = interval;
        if st.cfg.auto_poll {
            inner.arm_auto_clock(&mut st);
        }
        Ok(())
    }

    /// Subscribes to the scheduler's event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<Inner<T>> {
        &self.inner
    }
}

impl<T: Task + ?Sized> Inner<T> {
    fn manual_poll(&self) {
        let n = self.poll_requests.fetch_add(1, Ordering::Relaxed) + 1;
        self.valve.add(n, n);
    }

    fn dispatch(&self, task: &Arc<T>, op: TaskOp) -> bool {
        self.dispatcher.send(task, op)
    }

    /// Sends `cancel()` unless the task is already canceling or completed.
    fn cancel_request(&self, task: &Arc<T>) -> bool {
        !task.state().is_terminal() && self.dispatch(task, TaskOp::Cancel)
    }

    fn arm_auto_clock(self: &Arc<Self>, st: &mut State<T>) {
        let weak = Arc::downgrade(self);
        st.auto_clock
            .arm_repeating(&self.rt, &self.token, st.cfg.interval, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.poll();
                }
            });
        self.bus.publish(Event::new(EventKind::AutoPollStarted));
    }

    /// Runs one poll pass under the scheduler lock.
    pub(crate) fn poll(self: &Arc<Self>) -> PollSummary {
        let mut guard = self.state.lock();
        if guard.running_tasks.is_empty() {
            return PollSummary::default();
        }

        let now = Instant::now();
        let st = &mut *guard;
        let cfg = &st.cfg;
        let mut summary = PollSummary::default();
        let mut finished: Vec<(T::Key, TaskState)> = Vec::new();

        for task in &st.running_tasks {
            let id = task.id();
            let extra = st.extras.entry(id.clone()).or_insert_with(|| Extra::new(now));

            match task.state() {
                TaskState::Running => {
                    let progress = observed_progress(task.as_ref());
                    let stalled = extra.is_stalled(progress, now, cfg.timeout);
                    if summary.running >= cfg.max_activations || stalled {
                        if stalled {
                            extra.suspend_time = Some(now);
                            self.bus
                                .publish(Event::new(EventKind::TaskStalled).with_key(&id));
                        }
                        summary.suspended += 1;
                        let issued = self.dispatch(task, TaskOp::Suspend);
                        self.bus.publish(
                            Event::new(EventKind::TaskSuspended)
                                .with_key(&id)
                                .with_reason(if stalled { "stalled" } else { "over_capacity" })
                                .with_op_if(issued, TaskOp::Suspend),
                        );
                    } else {
                        extra.observe(progress, now);
                        summary.running += 1;
                    }
                }
                TaskState::Suspended => {
                    let wake = extra.may_wake(now, cfg.duration_of_suspension);
                    if summary.running < cfg.max_activations && wake {
                        let issued = self.dispatch(task, TaskOp::Resume);
                        summary.running += 1;
                        summary.resumed += 1;
                        extra.rebaseline(observed_progress(task.as_ref()), now);
                        self.bus.publish(
                            Event::new(EventKind::TaskResumed)
                                .with_key(&id)
                                .with_reason("admitted")
                                .with_op_if(issued, TaskOp::Resume),
                        );
                    }
                }
                state @ (TaskState::Canceling | TaskState::Completed) => {
                    finished.push((id, state));
                }
            }
        }

        if !finished.is_empty() {
            let gone: HashSet<&T::Key> = finished.iter().map(|(id, _)| id).collect();
            st.running_tasks.retain(|t| !gone.contains(&t.id()));
            for (id, state) in &finished {
                st.all_tasks.remove(id);
                st.extras.remove(id);
                self.bus.publish(
                    Event::new(EventKind::TaskRemoved)
                        .with_key(id)
                        .with_reason(state.as_label()),
                );
            }
        }
        summary.removed = finished.len();

        if !st.cfg.auto_poll {
            self.schedule_repoll(&mut st.repoll, st.cfg.interval);
        }

        trace!(?summary, "poll pass");
        self.bus
            .publish(Event::new(EventKind::PollCompleted).with_poll(summary));
        summary
    }

    /// Keeps request-driven polling alive with at most one pending re-poll.
    fn schedule_repoll(self: &Arc<Self>, slot: &mut TimerSlot, delay: Duration) {
        let weak = Arc::downgrade(self);
        slot.arm_once(&self.rt, &self.token, delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.manual_poll();
            }
        });
    }
}

impl<T: Task + ?Sized> Drop for Inner<T> {
    fn drop(&mut self) {
        debug!("scheduler dropped; stopping timers");
        self.token.cancel();
    }
}

impl<T: Task + ?Sized> State<T> {
    /// Removes every trace of `id` and returns the distinct tasks that held it.
    fn evict(&mut self, id: &T::Key) -> Vec<Arc<T>> {
        let mut evicted: Vec<Arc<T>> = Vec::new();
        let keep = |t: &Arc<T>, evicted: &mut Vec<Arc<T>>| {
            if t.id() != *id {
                return true;
            }
            if !evicted.iter().any(|e| Arc::ptr_eq(e, t)) {
                evicted.push(Arc::clone(t));
            }
            false
        };

        if let Some(task) = self.all_tasks.remove(id) {
            evicted.push(task);
        }
        self.running_tasks.retain(|t| keep(t, &mut evicted));
        self.suspend_tasks.retain(|t| keep(t, &mut evicted));
        self.extras.remove(id);
        evicted
    }

    /// Ids present in the registry or either partition.
    fn tracked_ids(&self) -> Vec<T::Key> {
        let mut seen: HashSet<T::Key> = HashSet::new();
        self.all_tasks
            .keys()
            .cloned()
            .chain(self.running_tasks.iter().map(|t| t.id()))
            .chain(self.suspend_tasks.iter().map(|t| t.id()))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}

/// Forwards bus events to the subscriber set until the scheduler stops.
fn subscriber_listener(rt: &Handle, bus: &Bus, token: CancellationToken, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    rt.spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        set.shutdown().await;
    });
}
