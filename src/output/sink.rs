//! # Push channel from a running evaluation to the session.
//!
//! An [`OutputSink`] is created fresh for every execution and handed to
//! [`Runtime::evaluate`](crate::Runtime::evaluate). The runtime pushes each
//! emitted line as soon as it is produced; the session drains the receiving end
//! into its [`OutputBuffer`](crate::OutputBuffer) while the evaluation runs.
//!
//! ```text
//! Runtime::evaluate ── emit(line) ──► [unbounded mpsc] ──► runner drain ──► OutputBuffer
//!                                                                      └──► Bus (OutputAppended)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit` never awaits; the channel is unbounded so no line is lost.
//! - **Per run**: once the run is over its receiver is dropped; a runtime that keeps
//!   emitting in the background gets `false` back and its lines are discarded.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::OutputLine;

/// Sending half of a run's output channel.
#[derive(Clone, Debug)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl OutputSink {
    /// Creates a sink together with the receiver that observes its lines.
    ///
    /// # Example
    /// ```
    /// use replvisor::OutputSink;
    ///
    /// let (sink, mut rx) = OutputSink::channel();
    /// assert!(sink.stdout("hello"));
    /// assert_eq!(rx.try_recv().unwrap().as_str(), "hello");
    /// ```
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutputLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Pushes one line. Returns `false` if nobody is listening anymore.
    pub fn emit(&self, line: OutputLine) -> bool {
        self.tx.send(line).is_ok()
    }

    /// Pushes one regular output line.
    pub fn stdout(&self, text: impl Into<Arc<str>>) -> bool {
        self.emit(OutputLine::stdout(text))
    }

    /// Pushes one diagnostic output line.
    pub fn stderr(&self, text: impl Into<Arc<str>>) -> bool {
        self.emit(OutputLine::stderr(text))
    }

    /// `true` once the run that owned this sink has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineKind;

    #[test]
    fn test_emit_after_receiver_dropped_is_rejected() {
        let (sink, rx) = OutputSink::channel();
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.stdout("late"));
    }

    #[test]
    fn test_clones_share_one_ordered_channel() {
        let (sink, mut rx) = OutputSink::channel();
        let other = sink.clone();
        sink.stdout("1");
        other.stderr("2");
        sink.stdout("3");

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let third = rx.try_recv().unwrap();
        assert_eq!(
            [first.as_str(), second.as_str(), third.as_str()],
            ["1", "2", "3"]
        );
        assert_eq!(second.kind, LineKind::Stderr);
    }
}
