//! # Logging subscriber.
//!
//! [`LogWriter`] renders scheduler events through `tracing`. Install any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see the output.
//!
//! ## Output format
//! ```text
//! INFO  task added task=7
//! INFO  task suspended task=7 reason=over_capacity op=suspend
//! WARN  task stalled task=7
//! DEBUG poll completed running=8 suspended=2 resumed=0 removed=1
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed logging subscriber.
///
/// Enabled via the `logging` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let op = e.op.map(|op| op.as_label()).unwrap_or("-");

        match e.kind {
            EventKind::TaskAdded => info!(seq = e.seq, task, "task added"),
            EventKind::TaskReplaced => info!(seq = e.seq, task, op, "task replaced"),
            EventKind::TaskCanceled => info!(seq = e.seq, task, op, "task canceled"),
            EventKind::TaskRemoved => info!(seq = e.seq, task, reason, "task removed"),
            EventKind::TaskSuspended => info!(seq = e.seq, task, reason, op, "task suspended"),
            EventKind::TaskResumed => info!(seq = e.seq, task, reason, op, "task resumed"),
            EventKind::TaskStalled => warn!(seq = e.seq, task, "task stalled"),
            EventKind::TaskPrioritized => debug!(seq = e.seq, task, "task prioritized"),
            EventKind::PollCompleted => {
                let s = e.poll.unwrap_or_default();
                debug!(
                    seq = e.seq,
                    running = s.running,
                    suspended = s.suspended,
                    resumed = s.resumed,
                    removed = s.removed,
                    "poll completed"
                );
            }
            EventKind::AutoPollStarted => info!(seq = e.seq, "auto-poll started"),
            EventKind::AutoPollStopped => info!(seq = e.seq, "auto-poll stopped"),
            EventKind::DispatchBacklog => {
                warn!(seq = e.seq, task, op, reason, "dispatch backlog");
            }
            EventKind::DispatchPanicked
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => {
                warn!(seq = e.seq, kind = ?e.kind, task, op, reason, "delivery failure");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
