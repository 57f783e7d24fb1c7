//! # Last valve: per-identifier debounce.
//!
//! `execute(id, action)` runs `action` once `id` has been quiet for its
//! interval. A newer `execute` for the same `id` cancels the pending one.
//!
//! The registry is owned by the caller; items live as long as the [`Last`]
//! that created them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, current_runtime};

/// Interval used for identifiers that were never configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Registry of debounce items keyed by identifier.
#[derive(Clone)]
pub struct Last {
    inner: Arc<LastInner>,
}

struct LastInner {
    items: Mutex<HashMap<String, Item>>,
    default_interval: Duration,
    rt: Handle,
    token: CancellationToken,
}

struct Item {
    interval: Duration,
    pending: Option<JoinHandle<()>>,
    /// Bumped whenever the pending action is replaced or canceled.
    epoch: u64,
}

impl Item {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            epoch: 0,
        }
    }

    fn disarm(&mut self) -> bool {
        self.epoch = self.epoch.wrapping_add(1);
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Last {
    /// Creates a registry using [`DEFAULT_DEBOUNCE`] for new identifiers.
    pub fn new() -> Result<Self, RuntimeError> {
        Self::with_default_interval(DEFAULT_DEBOUNCE)
    }

    /// Creates a registry with a custom default interval.
    pub fn with_default_interval(default_interval: Duration) -> Result<Self, RuntimeError> {
        let rt = current_runtime()?;
        Ok(Self {
            inner: Arc::new(LastInner {
                items: Mutex::new(HashMap::new()),
                default_interval,
                rt,
                token: CancellationToken::new(),
            }),
        })
    }

    /// Sets the debounce interval of `identifier`.
    ///
    /// Applies to schedules made after this call; an action already pending
    /// keeps its fire time.
    pub fn set_interval(&self, identifier: &str, interval: Duration) {
        let mut items = self.inner.items.lock();
        self.inner.item(&mut items, identifier).interval = interval;
    }

    /// Schedules `action` after the interval of `identifier`, replacing any
    /// action still pending for it.
    pub fn execute<F>(&self, identifier: &str, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = &self.inner;
        let mut items = inner.items.lock();
        let item = inner.item(&mut items, identifier);
        item.disarm();

        let epoch = item.epoch;
        let delay = item.interval;
        let id = identifier.to_owned();
        let weak: Weak<LastInner> = Arc::downgrade(inner);
        let token = inner.token.clone();

        item.pending = Some(inner.rt.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(inner) = weak.upgrade() else { return };
            if inner.take_due(&id, epoch) {
                action();
            }
        }));
    }

    /// Cancels the pending action of `identifier`. Returns whether one was pending.
    pub fn cancel(&self, identifier: &str) -> bool {
        let mut items = self.inner.items.lock();
        items
            .get_mut(identifier)
            .map(Item::disarm)
            .unwrap_or(false)
    }

    /// True if `identifier` has an action waiting to fire.
    pub fn is_pending(&self, identifier: &str) -> bool {
        self.inner
            .items
            .lock()
            .get(identifier)
            .is_some_and(|item| item.pending.is_some())
    }

    /// Number of identifiers known to this registry.
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LastInner {
    fn item<'a>(&self, items: &'a mut HashMap<String, Item>, identifier: &str) -> &'a mut Item {
        items
            .entry(identifier.to_owned())
            .or_insert_with(|| Item::new(self.default_interval))
    }

    /// Claims the pending slot for `epoch`; false if it was replaced meanwhile.
    fn take_due(&self, identifier: &str, epoch: u64) -> bool {
        let mut items = self.items.lock();
        match items.get_mut(identifier) {
            Some(item) if item.epoch == epoch => {
                item.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for LastInner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
