//! # taskvalve
//!
//! **Taskvalve** is an admission-controlled scheduler for externally driven
//! tasks, plus a small family of call-coalescing valves.
//!
//! The scheduler does not run work. Tasks execute elsewhere (a download,
//! a transfer, a worker thread) and report their [`TaskState`] and progress;
//! the scheduler periodically polls them and decides which may run, which
//! must pause, and which are finished.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  impl Task   │   │  impl Task   │   │  impl Task   │
//!     │  (state,     │   │  (state,     │   │  (state,     │
//!     │   progress)  │   │   progress)  │   │   progress)  │
//!     └──────▲───────┘   └──────▲───────┘   └──────▲───────┘
//!            │ resume/suspend/cancel (dispatch worker)│
//! ┌──────────┴──────────────────┴──────────────────┴──────────────────┐
//! │  Scheduler                                                        │
//! │  - registry + running list + suspended list                       │
//! │  - poll pass (admission budget, stall detection, purge)           │
//! │  - Merge valve (coalesces poll requests)                          │
//! │  - auto-poll clock / self-scheduled re-poll                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SchedulerConfig::bus_capacity)            │
//! └──────────────────┬──────────────────────────────┬─────────────────┘
//!                    ▼                              ▼
//!        subscriber listener               Scheduler::subscribe()
//!                    ▼
//!             SubscriberSet ──► worker per subscriber ──► sub.on_event()
//! ```
//!
//! ### Poll pass
//! ```text
//! running = 0
//! for task in running_tasks (list order = priority):
//!   Running   ─► stalled?            ─► suspend, hold for duration_of_suspension
//!              ─► running == max?     ─► suspend
//!              ─► otherwise           ─► running += 1
//!   Suspended ─► slot free and hold over ─► resume, running += 1
//!   Canceling / Completed ─► remove from all tracking
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                      |
//! |-------------------|--------------------------------------------------------------|-----------------------------------------|
//! | **Scheduling**    | Admission cap, FIFO/LIFO insertion, stall suspension.        | [`Scheduler`], [`SchedulerBuilder`]     |
//! | **Tasks**         | Capability trait implemented by the caller's work units.     | [`Task`], [`TaskState`], [`TaskOp`]     |
//! | **Valves**        | Merge (batch), Limit (throttle), Last (debounce).            | [`valve::Merge`], [`valve::Limit`], [`valve::Last`] |
//! | **Subscriber API**| Hook into scheduler events (logging, metrics, custom).       | [`Subscribe`], [`Event`]                |
//! | **Errors**        | Construction-time errors only.                               | [`RuntimeError`]                        |
//! | **Configuration** | Centralized, live-adjustable settings.                       | [`SchedulerConfig`], [`Policy`]         |
//!
//! ## Optional features
//! - `logging`: exports a `tracing`-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU8, Ordering};
//! use std::time::Duration;
//! use taskvalve::{Scheduler, SchedulerConfig, Task, TaskState};
//!
//! struct Transfer { id: u64, state: AtomicU8 }
//!
//! impl Transfer {
//!     fn set(&self, s: TaskState) { self.state.store(s as u8, Ordering::SeqCst) }
//! }
//!
//! impl Task for Transfer {
//!     type Key = u64;
//!     fn id(&self) -> u64 { self.id }
//!     fn state(&self) -> TaskState {
//!         match self.state.load(Ordering::SeqCst) {
//!             0 => TaskState::Running,
//!             1 => TaskState::Suspended,
//!             2 => TaskState::Canceling,
//!             _ => TaskState::Completed,
//!         }
//!     }
//!     fn progress(&self) -> f64 { 0.0 }
//!     fn resume(&self) { self.set(TaskState::Running) }
//!     fn suspend(&self) { self.set(TaskState::Suspended) }
//!     fn cancel(&self) { self.set(TaskState::Canceling) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SchedulerConfig { max_activations: 1, ..SchedulerConfig::default() };
//!     let sched = Scheduler::<Transfer>::builder(cfg).build()?;
//!
//!     let a = Arc::new(Transfer { id: 1, state: AtomicU8::new(1) });
//!     let b = Arc::new(Transfer { id: 2, state: AtomicU8::new(1) });
//!     sched.add([a.clone(), b.clone()]);
//!     sched.manual_poll();
//!     tokio::time::sleep(Duration::from_millis(20)).await;
//!
//!     assert_eq!(a.state(), TaskState::Running);
//!     assert_eq!(b.state(), TaskState::Suspended);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

pub mod valve;

// ---- Public re-exports ----

pub use crate::core::{Scheduler, SchedulerBuilder};
pub use config::{LimitConfig, MergeConfig, Policy, SchedulerConfig};
pub use error::RuntimeError;
pub use events::{Bus, Event, EventKind, PollSummary};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{DEFAULT_PRIORITY, Task, TaskOp, TaskState};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
