//! # Run a single execution against the runtime.
//!
//! Executes one [`Runtime::evaluate`] call with optional timeout, draining the
//! run's [`OutputSink`] into the session's [`OutputBuffer`] while it runs.
//!
//! - **Fresh channel per run**: lines of an abandoned earlier run cannot reach this buffer
//! - **Streaming**: each line is appended (and published) as soon as it is received
//! - **Apply timeout** if configured (wraps the evaluation in `tokio::time::timeout`)
//!
//! ## Flow
//! ```text
//! OutputSink::channel() ──► (sink, rx)
//!
//! loop select! (biased):
//!   rx.recv()      → buffer.append(line) + publish OutputAppended
//!   evaluate(sink) → break with result
//!
//! drain rx with try_recv (lines sent right before completion)
//! drop rx                (later sends from the runtime are discarded)
//!
//! Timeout:
//!   timeout exceeded → cancel token → evaluation future dropped → Err(Timeout)
//! ```
//!
//! ## Rules
//! - Lines are appended in the order the runtime emitted them.
//! - Every line received before the evaluation resolved is appended before `run_once` returns.
//! - The result is returned untouched; the session decides on status and error records.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    error::EvalError,
    events::{Bus, Event, EventKind},
    output::{OutputBuffer, OutputLine, OutputSink},
    runtime::Runtime,
};

/// Where captured lines go.
pub(crate) struct Capture<'a> {
    pub buffer: &'a OutputBuffer,
    pub bus: &'a Bus,
    pub session: &'a Arc<str>,
}

impl Capture<'_> {
    async fn record(&self, line: OutputLine) {
        self.buffer.append(line.clone()).await;
        self.bus.publish(
            Event::new(EventKind::OutputAppended)
                .with_session(Arc::clone(self.session))
                .with_line(line),
        );
    }
}

/// Evaluates `code` once, streaming its output into `capture`.
///
/// ### Timeout behavior
/// If `timeout` is `Some(dur)` and `dur > 0`:
/// - Wraps the evaluation in `tokio::time::timeout`
/// - On timeout: cancels `token`, drops the evaluation, returns `Timeout`
///
/// ### Cancellation semantics
/// `token` is handed to the runtime; a runtime that honors it returns
/// `Err(EvalError::Canceled)`.
pub(crate) async fn run_once<R: Runtime + ?Sized>(
    runtime: &R,
    code: &str,
    capture: Capture<'_>,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<(), EvalError> {
    let (sink, mut rx) = OutputSink::channel();

    let eval = async {
        let fut = runtime.evaluate(code, sink, token.clone());
        match timeout.filter(|d| *d > Duration::ZERO) {
            Some(dur) => match time::timeout(dur, fut).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    token.cancel();
                    Err(EvalError::Timeout { timeout: dur })
                }
            },
            None => fut.await,
        }
    };
    tokio::pin!(eval);

    let res = loop {
        tokio::select! {
            biased;
            Some(line) = rx.recv() => capture.record(line).await,
            res = &mut eval => break res,
        }
    };

    while let Ok(line) = rx.try_recv() {
        capture.record(line).await;
    }
    drop(rx);
    res
}
