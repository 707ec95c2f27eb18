//! # LogWriter: event logger
//!
//! A minimal subscriber that records incoming [`Event`]s through `tracing`.
//! Install a `tracing` subscriber (for example `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO [status] session="editor" status=loading
//! INFO [load-ok] session="editor" runtime="python3"
//! INFO [exec-start] session="editor" run=1
//! INFO [output] session="editor" line="hello"
//! WARN [exec-raised] session="editor" run=1 err="ZeroDivisionError: division by zero"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let session = e.session.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::StatusChanged => {
                let status = e.status.map(|s| s.as_label()).unwrap_or("-");
                info!("[status] session={session:?} status={status}");
            }
            EventKind::LoadRequested => info!("[load] session={session:?}"),
            EventKind::LoadSucceeded => info!("[load-ok] session={session:?} runtime={reason:?}"),
            EventKind::LoadFailed => warn!("[load-failed] session={session:?} err={reason:?}"),
            EventKind::ExecutionStarted => {
                info!("[exec-start] session={session:?} run={:?}", e.attempt);
            }
            EventKind::ExecutionFinished => {
                info!(
                    "[exec-done] session={session:?} run={:?} elapsed_ms={:?}",
                    e.attempt, e.elapsed_ms
                );
            }
            EventKind::ExecutionRaised => {
                warn!("[exec-raised] session={session:?} run={:?} err={reason:?}", e.attempt);
            }
            EventKind::ExecutionTimedOut => {
                warn!(
                    "[exec-timeout] session={session:?} run={:?} timeout_ms={:?}",
                    e.attempt, e.timeout_ms
                );
            }
            EventKind::ExecutionCancelled => {
                info!("[exec-cancelled] session={session:?} run={:?}", e.attempt);
            }
            EventKind::RuntimeBroken => {
                warn!("[runtime-broken] session={session:?} run={:?} err={reason:?}", e.attempt);
            }
            EventKind::ExecutionRejected => {
                let status = e.status.map(|s| s.as_label()).unwrap_or("-");
                warn!("[exec-rejected] session={session:?} status={status}");
            }
            EventKind::ExecutionSkipped => info!("[exec-skipped] session={session:?} no runtime"),
            EventKind::OutputReset => info!("[output-reset] session={session:?}"),
            EventKind::OutputAppended => {
                let line = e.line.as_ref().map(|l| l.as_str()).unwrap_or("");
                info!("[output] session={session:?} line={line:?}");
            }
            EventKind::SubscriberOverflow => {
                warn!("[subscriber-overflow] subscriber={session:?} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                warn!("[subscriber-panicked] subscriber={session} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
