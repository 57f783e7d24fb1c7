//! Recording task used by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{Task, TaskState};

/// Task whose requests apply synchronously and are counted.
pub(crate) struct MockTask {
    id: u32,
    state: Mutex<TaskState>,
    progress: Mutex<f64>,
    pub resumes: AtomicUsize,
    pub suspends: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl MockTask {
    /// New task reporting `Suspended`, the state of a task that has not started yet.
    pub fn new(id: u32) -> Arc<Self> {
        Self::with_state(id, TaskState::Suspended)
    }

    pub fn with_state(id: u32, state: TaskState) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(state),
            progress: Mutex::new(0.0),
            resumes: AtomicUsize::new(0),
            suspends: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    pub fn set_progress(&self, p: f64) {
        *self.progress.lock() = p;
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn suspends(&self) -> usize {
        self.suspends.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Task for MockTask {
    type Key = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn state(&self) -> TaskState {
        *self.state.lock()
    }

    fn progress(&self) -> f64 {
        *self.progress.lock()
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.set_state(TaskState::Running);
    }

    fn suspend(&self) {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        self.set_state(TaskState::Suspended);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.set_state(TaskState::Canceling);
    }
}
