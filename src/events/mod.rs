//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the scheduler, its poll pass and
//! its dispatch worker.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`PollSummary`] counters produced by one poll pass
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` operations, the poll pass, the dispatch
//!   worker (overflow/panic).
//! - **Consumers**: the scheduler's subscriber listener (fans out to
//!   `SubscriberSet`) and any receiver obtained from [`Scheduler::subscribe`](crate::Scheduler::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, PollSummary};
