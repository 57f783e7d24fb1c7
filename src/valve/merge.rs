//! # Merge valve: coalescing buffer.
//!
//! ```text
//! add(v1, a) ─┐                         ┌─► action([v2, v3], {a: v2, b: v3})
//! add(v2, a) ─┼─► [ a:v2, b:v3 ] ─ interval ─┤
//! add(v3, b) ─┘                         └─ or immediately once len >= max_merge_count
//! ```
//!
//! ## Rules
//! - The first pending value arms a flush `interval` from now (`0` = next tick).
//! - Re-adding a key replaces its value **and** moves it to the end of the batch.
//! - Reaching `max_merge_count` arms an immediate flush.
//! - A flush delivers and clears the whole batch atomically; stale flushes
//!   (batch already drained) and empty batches deliver nothing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::MergeConfig;
use crate::error::{RuntimeError, current_runtime};

type MergeAction<K, V> = Box<dyn Fn(Vec<V>, HashMap<K, V>) + Send + Sync>;

/// Batch-and-flush valve keyed by `K`.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use taskvalve::{MergeConfig, valve::Merge};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), taskvalve::RuntimeError> {
///     let merge = Merge::new(MergeConfig::default(), |values: Vec<u32>, _by_key| {
///         println!("flushed {values:?}");
///     })?;
///     merge.add(1, "a");
///     merge.add(2, "a");
///     tokio::time::sleep(Duration::from_millis(150)).await; // prints "flushed [2]"
///     Ok(())
/// }
/// ```
pub struct Merge<K, V> {
    inner: Arc<MergeInner<K, V>>,
}

impl<K, V> Clone for Merge<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MergeInner<K, V> {
    cfg: MergeConfig,
    action: MergeAction<K, V>,
    buf: Mutex<Batch<K, V>>,
    rt: Handle,
    token: CancellationToken,
}

struct Batch<K, V> {
    /// Pending values in delivery order, tagged with their key.
    objects: Vec<(K, V)>,
    /// Latest value per key.
    key_objects: HashMap<K, V>,
    /// Incremented by every delivered flush; armed flushes carry the epoch they belong to.
    epoch: u64,
}

impl<K, V> Merge<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a merge valve on the current tokio runtime.
    pub fn new<F>(cfg: MergeConfig, action: F) -> Result<Self, RuntimeError>
    where
        F: Fn(Vec<V>, HashMap<K, V>) + Send + Sync + 'static,
    {
        Ok(Self::on_runtime(current_runtime()?, cfg, action))
    }

    /// Creates a merge valve whose flush timers run on `rt`.
    pub(crate) fn on_runtime<F>(rt: Handle, cfg: MergeConfig, action: F) -> Self
    where
        F: Fn(Vec<V>, HashMap<K, V>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(MergeInner {
                cfg,
                action: Box::new(action),
                buf: Mutex::new(Batch {
                    objects: Vec::new(),
                    key_objects: HashMap::new(),
                    epoch: 0,
                }),
                rt,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Buffers `value` under `key`, replacing any pending value for that key.
    pub fn add(&self, value: V, key: K) {
        let inner = &self.inner;
        let mut buf = inner.buf.lock();

        if buf.key_objects.is_empty() {
            inner.arm_flush(buf.epoch, inner.cfg.interval);
        }
        if buf.key_objects.contains_key(&key) {
            if let Some(pos) = buf.objects.iter().position(|(k, _)| *k == key) {
                buf.objects.remove(pos);
            }
        }
        buf.objects.push((key.clone(), value.clone()));
        buf.key_objects.insert(key, value);

        if buf.objects.len() >= inner.cfg.max_merge_count {
            inner.arm_flush(buf.epoch, Duration::ZERO);
        }
    }

    /// Number of values waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.buf.lock().objects.len()
    }
}

impl<K, V> MergeInner<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn arm_flush(self: &Arc<Self>, epoch: u64, delay: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.token.clone();
        self.rt.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(inner) = weak.upgrade() {
                inner.run_merge(epoch);
            }
        });
    }

    /// Delivers the batch that belongs to `epoch`, if it is still pending.
    fn run_merge(&self, epoch: u64) {
        let mut buf = self.buf.lock();
        if buf.epoch != epoch || buf.objects.is_empty() {
            return;
        }
        buf.epoch = buf.epoch.wrapping_add(1);
        let objects: Vec<V> = std::mem::take(&mut buf.objects)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        let key_objects = std::mem::take(&mut buf.key_objects);
        trace!(count = objects.len(), "merge flush");
        (self.action)(objects, key_objects);
    }
}

impl<K, V> Drop for MergeInner<K, V> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
