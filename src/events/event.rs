//! # Session events.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Load events**: the session waiting on the loader and its outcome
//! - **Execution events**: one submit-and-run cycle
//! - **Output events**: buffer reset and each captured line
//! - **Subscriber events**: delivery problems inside the subscriber set
//!
//! The [`Event`] struct carries additional metadata such as timestamps, session name,
//! status, captured line and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one session, `OutputAppended` events are published in emission order and
//! always after the `OutputReset` of their run.
//!
//! ## Example
//! ```rust
//! use replvisor::{Event, EventKind, SessionStatus};
//!
//! let ev = Event::new(EventKind::StatusChanged)
//!     .with_session("editor")
//!     .with_status(SessionStatus::Ready);
//!
//! assert_eq!(ev.kind, EventKind::StatusChanged);
//! assert_eq!(ev.session.as_deref(), Some("editor"));
//! assert_eq!(ev.status, Some(SessionStatus::Ready));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::SessionStatus;
use crate::output::OutputLine;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `session`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `session`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Status ===
    /// The session moved to a new status.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `status`: the new status
    StatusChanged,

    // === Load events ===
    /// The session started waiting on the loader.
    ///
    /// Sets:
    /// - `session`: session name
    LoadRequested,

    /// The loader produced a runtime handle for this session.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `reason`: runtime name
    LoadSucceeded,

    /// The loader failed; the session is `Errored`.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `reason`: load error message
    LoadFailed,

    // === Execution events ===
    /// An execution request was accepted.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `attempt`: 1-based execution counter of this session
    ExecutionStarted,

    /// The code ran to completion.
    ///
    /// Sets:
    /// - `session`, `attempt`
    /// - `elapsed_ms`: wall time of the evaluation (ms)
    ExecutionFinished,

    /// The code raised an exception; the session stays usable.
    ///
    /// Sets:
    /// - `session`, `attempt`, `elapsed_ms`
    /// - `reason`: exception message
    ExecutionRaised,

    /// The evaluation exceeded the session timeout.
    ///
    /// Sets:
    /// - `session`, `attempt`
    /// - `timeout_ms`: configured timeout (ms)
    ExecutionTimedOut,

    /// The evaluation stopped after `Session::cancel`.
    ///
    /// Sets:
    /// - `session`, `attempt`, `elapsed_ms`
    ExecutionCancelled,

    /// The runtime failed underneath the execution; the session is `Errored`.
    ///
    /// Sets:
    /// - `session`, `attempt`
    /// - `reason`: infrastructure error message
    RuntimeBroken,

    /// The request was refused because the session was not `Ready`.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `status`: status observed at submission
    ExecutionRejected,

    /// The request was ignored because no runtime handle was held.
    ///
    /// Sets:
    /// - `session`: session name
    ExecutionSkipped,

    // === Output events ===
    /// The output buffer (and error record) was cleared.
    ///
    /// Sets:
    /// - `session`: session name
    OutputReset,

    /// One line was appended to the output buffer.
    ///
    /// Sets:
    /// - `session`: session name
    /// - `line`: the captured line
    OutputAppended,
}

/// Session event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Event classification.
    pub kind: EventKind,
    /// Name of the session (or subscriber, for subscriber events).
    pub session: Option<Arc<str>>,
    /// Status carried by `StatusChanged` / `ExecutionRejected`.
    pub status: Option<SessionStatus>,
    /// Captured line carried by `OutputAppended`.
    pub line: Option<OutputLine>,
    /// Human-readable reason (errors, runtime names, overflow details).
    pub reason: Option<Arc<str>>,
    /// Execution counter (starting from 1).
    pub attempt: Option<u64>,
    /// Execution timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Evaluation wall time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            session: None,
            status: None,
            line: None,
            reason: None,
            attempt: None,
            timeout_ms: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a session name.
    #[inline]
    pub fn with_session(mut self, session: impl Into<Arc<str>>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Attaches a status.
    #[inline]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a captured line.
    #[inline]
    pub fn with_line(mut self, line: OutputLine) -> Self {
        self.line = Some(line);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an execution counter.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_session(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_session(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::OutputReset);
        let b = Event::new(EventKind::OutputReset);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_saturate_at_u32() {
        let ev = Event::new(EventKind::ExecutionTimedOut)
            .with_timeout(Duration::from_secs(u64::MAX / 1_000_000));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn test_subscriber_helpers() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));

        let ev = Event::subscriber_panicked("audit", "oops".into());
        assert!(ev.is_subscriber_panic());
    }
}
