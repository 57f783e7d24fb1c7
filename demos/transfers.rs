//! # Example: Throttled transfers
//!
//! Six simulated file transfers compete for two slots. One of them stalls
//! halfway; the scheduler suspends it, admits the next transfer, and
//! reconsiders the stalled one after the suspension window.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example transfers --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use taskvalve::{LogWriter, Scheduler, SchedulerConfig, Subscribe, Task, TaskState};
use tracing_subscriber::EnvFilter;

struct Transfer {
    name: &'static str,
    /// Progress gained per 50ms tick while running.
    speed: f64,
    /// Progress at which this transfer stops advancing.
    stall_at: Option<f64>,
    inner: Mutex<(TaskState, f64)>,
}

impl Transfer {
    fn new(name: &'static str, speed: f64, stall_at: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            name,
            speed,
            stall_at,
            inner: Mutex::new((TaskState::Suspended, 0.0)),
        })
    }

    /// Advances the transfer by one tick if it is running.
    fn tick(&self) {
        let mut inner = self.inner.lock();
        if inner.0 != TaskState::Running {
            return;
        }
        let limit = self.stall_at.unwrap_or(1.0);
        inner.1 = (inner.1 + self.speed).min(limit);
        if inner.1 >= 1.0 {
            inner.0 = TaskState::Completed;
        }
    }

    fn set_state(&self, state: TaskState) {
        self.inner.lock().0 = state;
    }
}

impl Task for Transfer {
    type Key = &'static str;

    fn id(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> TaskState {
        self.inner.lock().0
    }

    fn progress(&self) -> f64 {
        self.inner.lock().1
    }

    fn resume(&self) {
        self.set_state(TaskState::Running);
    }

    fn suspend(&self) {
        self.set_state(TaskState::Suspended);
    }

    fn cancel(&self) {
        self.set_state(TaskState::Canceling);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = SchedulerConfig {
        max_activations: 2,
        timeout: Duration::from_millis(500),
        duration_of_suspension: Duration::from_secs(2),
        interval: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let sched = Scheduler::<Transfer>::builder(cfg)
        .with_subscribers(subs)
        .build()?;

    let transfers = vec![
        Transfer::new("kernel.tar.xz", 0.05, None),
        Transfer::new("backup.img", 0.04, Some(0.5)),
        Transfer::new("photos.zip", 0.08, None),
        Transfer::new("notes.md", 0.25, None),
        Transfer::new("video.mkv", 0.03, None),
        Transfer::new("music.flac", 0.06, None),
    ];
    sched.add(transfers.iter().cloned());
    sched.prioritize(&["notes.md"]);
    sched.manual_poll();

    // Drive the simulated network.
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    for _ in 0..200 {
        ticker.tick().await;
        transfers.iter().for_each(|t| t.tick());
        if sched.running_tasks().iter().all(|t| t.id() == "backup.img") {
            break;
        }
    }

    // The stalled transfer never finishes on its own.
    sched.cancel_all();
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!();
    println!("Transfers:");
    for t in &transfers {
        println!(" ├─► {:<14} {:>5.1}%  {}", t.name, t.progress() * 100.0, t.state().as_label());
    }
    Ok(())
}
