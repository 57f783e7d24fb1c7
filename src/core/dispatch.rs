//! # Dispatch worker: fire-and-forget task requests.
//!
//! The scheduler decides under its lock and enqueues here; the worker
//! applies the requests outside of any scheduler lock, in submission order.
//!
//! ```text
//! Scheduler (locked) ── send(Request) ──► [unbounded queue] ──► worker ──► task.resume()/suspend()/cancel()
//!                            │                                     │
//!                            └─ depth > soft limit ─► DispatchBacklog   └─ panic ─► DispatchPanicked
//! ```
//!
//! ## Rules
//! - `send` never blocks and never drops a request while the worker is alive.
//!   A decision taken under the lock (an eviction's `cancel()`, a poll's
//!   `suspend()`) is therefore always delivered exactly once.
//! - `capacity` is a soft limit: crossing it publishes one `DispatchBacklog`
//!   until the queue drains back below it.
//! - A panicking callback is caught; the worker moves on to the next request.
//! - The worker exits once the `Dispatcher` (the only sender) is dropped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Task, TaskOp};

struct Request<T: ?Sized> {
    task: Arc<T>,
    op: TaskOp,
}

/// Sending half of the callback worker.
pub(crate) struct Dispatcher<T: Task + ?Sized> {
    tx: mpsc::UnboundedSender<Request<T>>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
    bus: Bus,
}

impl<T: Task + ?Sized> Dispatcher<T> {
    /// Spawns the worker on `rt`; `capacity` is the backlog warning threshold.
    pub fn spawn(capacity: usize, bus: Bus, rt: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Request<T>>();
        let depth = Arc::new(AtomicUsize::new(0));
        let worker_depth = Arc::clone(&depth);
        let worker_bus = bus.clone();

        rt.spawn(async move {
            while let Some(Request { task, op }) = rx.recv().await {
                if let Err(panic_err) = catch_unwind(AssertUnwindSafe(|| op.apply(task.as_ref()))) {
                    let info = panic_message(&*panic_err);
                    warn!(task = ?task.id(), op = op.as_label(), %info, "task callback panicked");
                    worker_bus.publish(
                        Event::new(EventKind::DispatchPanicked)
                            .with_key(&task.id())
                            .with_op(op)
                            .with_reason(info),
                    );
                }
                worker_depth.fetch_sub(1, Ordering::AcqRel);
            }
        });

        Self {
            tx,
            depth,
            capacity: capacity.max(1),
            bus,
        }
    }

    /// Enqueues `op` for `task`. Returns `false` only if the worker has stopped.
    pub fn send(&self, task: &Arc<T>, op: TaskOp) -> bool {
        let req = Request {
            task: Arc::clone(task),
            op,
        };
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(req).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            warn!(task = ?task.id(), op = op.as_label(), "dispatch worker stopped; request dropped");
            return false;
        }
        if depth == self.capacity + 1 {
            warn!(depth, capacity = self.capacity, "dispatch backlog over soft limit");
            self.bus.publish(
                Event::new(EventKind::DispatchBacklog)
                    .with_key(&task.id())
                    .with_op(op)
                    .with_reason(format!("depth={depth} capacity={}", self.capacity)),
            );
        }
        true
    }

    /// Requests queued and not yet applied.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}
