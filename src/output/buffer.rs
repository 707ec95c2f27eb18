//! # Ordered transcript of the current execution.
//!
//! [`OutputBuffer`] holds the [`OutputLine`]s captured for the run in progress
//! (or the last finished run). It is reset, never appended to, at the start of
//! each execution, so output of one run cannot bleed into the next.
//!
//! ## Rules
//! - Insertion order is emission order; nothing reorders or batches lines.
//! - `reset()` is called by the session before any line of the new run is
//!   appended.
//! - Reads return snapshots; the buffer keeps growing behind them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Origin of a captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Regular output written by the executed code.
    Stdout,
    /// Diagnostic output written by the executed code.
    Stderr,
    /// Error record appended by the session (`"Error: <message>"`).
    Error,
}

/// One unit of captured output (one emitted write).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputLine {
    /// Where the line came from.
    pub kind: LineKind,
    /// The text, without a trailing newline.
    pub text: Arc<str>,
}

impl OutputLine {
    /// A regular output line.
    pub fn stdout(text: impl Into<Arc<str>>) -> Self {
        Self {
            kind: LineKind::Stdout,
            text: text.into(),
        }
    }

    /// A diagnostic output line.
    pub fn stderr(text: impl Into<Arc<str>>) -> Self {
        Self {
            kind: LineKind::Stderr,
            text: text.into(),
        }
    }

    /// The transcript line for an error record.
    ///
    /// # Example
    /// ```
    /// use replvisor::{LineKind, OutputLine};
    ///
    /// let line = OutputLine::error("boom");
    /// assert_eq!(line.as_str(), "Error: boom");
    /// assert_eq!(line.kind, LineKind::Error);
    /// ```
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            kind: LineKind::Error,
            text: format!("Error: {message}").into(),
        }
    }

    /// Text of the line.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, LineKind::Error)
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Append-only line store for the current execution.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    lines: RwLock<Vec<OutputLine>>,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the buffer. Returns the number of discarded lines.
    pub async fn reset(&self) -> usize {
        let mut lines = self.lines.write().await;
        let dropped = lines.len();
        lines.clear();
        dropped
    }

    /// Adds `line` to the end. Returns its 0-based position.
    pub async fn append(&self, line: OutputLine) -> usize {
        let mut lines = self.lines.write().await;
        lines.push(line);
        lines.len() - 1
    }

    /// Returns a copy of the lines captured so far, in order.
    pub async fn snapshot(&self) -> Vec<OutputLine> {
        self.lines.read().await.clone()
    }

    /// Returns just the text of the captured lines, in order.
    pub async fn texts(&self) -> Vec<String> {
        self.lines
            .read()
            .await
            .iter()
            .map(|l| l.text.to_string())
            .collect()
    }

    /// Number of lines captured so far.
    pub async fn len(&self) -> usize {
        self.lines.read().await.len()
    }

    /// `true` if nothing has been captured since the last reset.
    pub async fn is_empty(&self) -> bool {
        self.lines.read().await.is_empty()
    }

    /// Returns the last line, if any.
    pub async fn last(&self) -> Option<OutputLine> {
        self.lines.read().await.last().cloned()
    }
}
