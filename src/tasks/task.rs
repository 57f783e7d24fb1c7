//! # Task capability.
//!
//! The scheduler never performs work itself. It observes a task's
//! [`state`](Task::state) and [`progress`](Task::progress) and issues
//! [`resume`](Task::resume) / [`suspend`](Task::suspend) /
//! [`cancel`](Task::cancel) requests from a background worker.
//!
//! ## Contract
//! - `id()` is stable for the task's lifetime. If the implementor also
//!   implements `PartialEq`/`Hash`, both must be defined **solely** by `id`.
//! - `state()` and `progress()` may be called from any thread at any time,
//!   concurrently with the task's own forward progress.
//! - `resume()` / `suspend()` / `cancel()` are requests. They may apply
//!   asynchronously and may be invoked more than once; they must tolerate it.

use std::fmt::Debug;
use std::hash::Hash;

use super::TaskState;

/// Advisory priority returned by [`Task::priority`] when not overridden.
pub const DEFAULT_PRIORITY: f32 = 0.5;

/// # Externally driven, suspendable unit of work.
///
/// # Example
/// ```
/// use std::sync::Mutex;
/// use taskvalve::{Task, TaskState};
///
/// struct Download {
///     url: String,
///     state: Mutex<TaskState>,
/// }
///
/// impl Task for Download {
///     type Key = String;
///
///     fn id(&self) -> String { self.url.clone() }
///     fn state(&self) -> TaskState { *self.state.lock().unwrap() }
///     fn progress(&self) -> f64 { 0.0 }
///     fn resume(&self) { *self.state.lock().unwrap() = TaskState::Running; }
///     fn suspend(&self) { *self.state.lock().unwrap() = TaskState::Suspended; }
///     fn cancel(&self) { *self.state.lock().unwrap() = TaskState::Canceling; }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Identity used for registry lookups and replacement.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns the stable identity of this task.
    fn id(&self) -> Self::Key;

    /// Returns the current lifecycle state.
    fn state(&self) -> TaskState;

    /// Fraction completed in `[0, 1]`.
    ///
    /// Expected to be non-decreasing, but regressions are tolerated.
    fn progress(&self) -> f64;

    /// Advisory priority. Admission order does not consult it.
    fn priority(&self) -> f32 {
        DEFAULT_PRIORITY
    }

    /// Requests the task to (re)start making progress.
    fn resume(&self);

    /// Requests the task to pause.
    fn suspend(&self);

    /// Requests the task to stop permanently.
    fn cancel(&self);
}

/// Reads a task's progress, mapping non-finite values to `0.0` and
/// clamping the rest into `[0, 1]`.
pub(crate) fn observed_progress<T: Task + ?Sized>(task: &T) -> f64 {
    let p = task.progress();
    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
}
