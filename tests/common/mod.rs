#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use taskvalve::{Task, TaskState};

/// Externally driven task that applies requests immediately and counts them.
pub struct Probe {
    id: &'static str,
    state: Mutex<TaskState>,
    progress: Mutex<f64>,
    resumes: AtomicUsize,
    suspends: AtomicUsize,
    cancels: AtomicUsize,
}

impl Probe {
    pub fn new(id: &'static str) -> Arc<Self> {
        Self::with_state(id, TaskState::Suspended)
    }

    pub fn with_state(id: &'static str, state: TaskState) -> Arc<Self> {
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

    pub fn set_progress(&self, progress: f64) {
        *self.progress.lock() = progress;
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

impl Task for Probe {
    type Key = &'static str;

    fn id(&self) -> &'static str {
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

pub fn ids(tasks: &[Arc<Probe>]) -> Vec<&'static str> {
    tasks.iter().map(|t| t.id()).collect()
}

/// Lets spawned flushes, poll passes and the dispatch worker run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
