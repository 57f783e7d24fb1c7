//! # Valves: call-coalescing primitives.
//!
//! A valve turns a burst of trigger events into a controlled cadence of
//! downstream actions.
//!
//! | Valve     | Behaviour                                              | Delivers                      |
//! |-----------|--------------------------------------------------------|-------------------------------|
//! | [`Merge`] | batch-and-flush, last write per key wins               | `(Vec<V>, HashMap<K, V>)`     |
//! | [`Limit`] | throttle/drip, one value per interval, idle when empty | `V`                           |
//! | [`Last`]  | per-identifier debounce                                | the most recent action        |
//!
//! ## Rules
//! - Every valve spawns its timers on the tokio runtime captured at construction.
//! - `Merge` and `Limit` invoke their callback **while holding the valve lock**:
//!   callbacks must not block and must not call back into the same valve
//!   synchronously (spawn instead).
//! - `Last` runs actions outside its lock; an action may schedule the next one.
//! - Dropping the last handle of a valve cancels its pending timers.

mod last;
mod limit;
mod merge;

pub use last::{DEFAULT_DEBOUNCE, Last};
pub use limit::Limit;
pub use merge::Merge;
