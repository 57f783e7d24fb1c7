//! # Task states and the requests the scheduler issues.
//!
//! The poller distinguishes only three cases: running, suspended, and
//! *terminal* (canceling or completed). Any state may follow any other
//! between two polls; no transition is validated.

use super::Task;

/// Lifecycle state reported by a [`Task`].
///
/// Variants are ordered by rank: `Running < Suspended < Canceling < Completed`.
/// A task at or beyond [`TaskState::Canceling`] never receives another
/// `cancel()` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Actively making progress.
    Running,
    /// Paused; may be resumed.
    Suspended,
    /// Cancellation requested, not yet finished.
    Canceling,
    /// Finished (successfully or not; the scheduler cannot tell).
    Completed,
}

impl TaskState {
    /// True for `Canceling` and `Completed`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self >= TaskState::Canceling
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Canceling => "canceling",
            TaskState::Completed => "completed",
        }
    }
}

/// A request the scheduler sends to a task through its dispatch worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOp {
    Resume,
    Suspend,
    Cancel,
}

impl TaskOp {
    /// Invokes the matching method on `task`.
    pub fn apply<T: Task + ?Sized>(self, task: &T) {
        match self {
            TaskOp::Resume => task.resume(),
            TaskOp::Suspend => task.suspend(),
            TaskOp::Cancel => task.cancel(),
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            TaskOp::Resume => "resume",
            TaskOp::Suspend => "suspend",
            TaskOp::Cancel => "cancel",
        }
    }
}
