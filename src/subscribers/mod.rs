//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by the scheduler to deliver [`Event`](crate::Event)s.
//!
//! ## Architecture
//! ```text
//! Scheduler ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit
//!                                                                   │
//!                                                      ┌────────────┼────────────┐
//!                                                      ▼            ▼            ▼
//!                                                  LogWriter     Metrics      Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use taskvalve::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct StallCounter;
//!
//! #[async_trait]
//! impl Subscribe for StallCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TaskStalled {
//!             // increment a counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "stall-counter" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
