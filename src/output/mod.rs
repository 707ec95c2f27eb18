//! Captured output: the per-run transcript and the channel that feeds it.
//!
//! ## Contents
//! - [`OutputBuffer`], [`OutputLine`], [`LineKind`] the ordered transcript
//! - [`OutputSink`] push channel handed to the runtime for one execution

mod buffer;
mod sink;

pub use buffer::{LineKind, OutputBuffer, OutputLine};
pub use sink::OutputSink;
