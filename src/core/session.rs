//! # Session: consumer-facing execution context.
//!
//! A [`Session`] owns the status machine, the output buffer and the error record
//! of one UI surface. It borrows the runtime from the shared [`Loader`] and
//! publishes every observable change on its event [`Bus`].
//!
//! ## High-level architecture
//! ```text
//! Host UI ── ensure_loaded() ──► Session ──► Loader::ensure_loaded() (single-flight)
//!         ── execute(code)  ──►    │
//!                                  ├─ lock Inner: check handle / status, → Executing,
//!                                  │              reset OutputBuffer, clear error
//!                                  ├─ runner::run_once(runtime, code) ──► OutputBuffer
//!                                  │                                  └─► Bus (OutputAppended)
//!                                  └─ lock Inner: → Ready (or Errored), error record
//!
//! Bus ──► Session::subscribe() receivers
//!     └─► subscriber_listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ## Rules
//! - The `Inner` lock is never held across the loader or the evaluation.
//! - The buffer reset of a run happens under the `Inner` lock, before the run's
//!   output channel exists.
//! - `execute` without a runtime handle is a silent no-op.
//! - `execute` in any status other than `Ready` is rejected; nothing is queued.
//! - A user-code exception ends in `Ready`; only a broken runtime ends in `Errored`.
//!
//! ## Example
//! ```no_run
//! use replvisor::{Loader, LoaderConfig, ProcessConfig, ProcessProvider, Session, SessionConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = Loader::arc(
//!         ProcessProvider::arc(ProcessConfig::default()),
//!         LoaderConfig::default(),
//!     );
//!     let session = Session::new(loader, SessionConfig::default());
//!
//!     session.ensure_loaded().await?;
//!     session.execute("print('hello')").await?;
//!
//!     for line in session.output().await {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{
    Loader, SessionConfig, SessionStatus,
    builder::SessionBuilder,
    runner::{self, Capture},
};
use crate::error::{EvalError, LoadError, SessionError};
use crate::events::{Bus, Event, EventKind};
use crate::output::{OutputBuffer, OutputLine};
use crate::runtime::RuntimeRef;

/// Mutable session state guarded by one lock.
struct Inner {
    status: SessionStatus,
    runtime: Option<RuntimeRef>,
    error: Option<Arc<str>>,
    current: Option<CancellationToken>,
}

/// Consumer-facing execution context over the shared runtime.
pub struct Session {
    cfg: SessionConfig,
    name: Arc<str>,
    loader: Arc<Loader>,
    bus: Bus,
    output: OutputBuffer,
    inner: Mutex<Inner>,
    runs: AtomicU64,
    root: CancellationToken,
}

impl Session {
    /// Returns a builder for a session over `loader`.
    pub fn builder(loader: Arc<Loader>) -> SessionBuilder {
        SessionBuilder::new(loader)
    }

    /// Creates a session without subscribers.
    pub fn new(loader: Arc<Loader>, cfg: SessionConfig) -> Arc<Self> {
        SessionBuilder::new(loader).with_config(cfg).build()
    }

    pub(crate) fn new_internal(
        cfg: SessionConfig,
        loader: Arc<Loader>,
        bus: Bus,
        root: CancellationToken,
    ) -> Self {
        Self {
            name: Arc::from(cfg.name.as_ref()),
            cfg,
            loader,
            bus,
            output: OutputBuffer::new(),
            inner: Mutex::new(Inner {
                status: SessionStatus::Uninitialized,
                runtime: None,
                error: None,
                current: None,
            }),
            runs: AtomicU64::new(0),
            root,
        }
    }

    /// Session label used in events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings this session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    /// The loader this session borrows its runtime from.
    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// Current status.
    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status
    }

    /// Snapshot of the current run's transcript, in emission order.
    pub async fn output(&self) -> Vec<OutputLine> {
        self.output.snapshot().await
    }

    /// The live output buffer, for polling consumers.
    pub fn buffer(&self) -> &OutputBuffer {
        &self.output
    }

    /// Message of the last error record, if any.
    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.as_deref().map(str::to_string)
    }

    /// Creates a receiver for this session's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Clears output and error record; status and runtime are left as they are.
    pub async fn reset_output(&self) {
        let mut inner = self.inner.lock().await;
        inner.error = None;
        self.output.reset().await;
        self.publish(Event::new(EventKind::OutputReset));
    }

    /// Requests cooperative cancellation of the execution in flight.
    ///
    /// Returns `false` if nothing is running. The runtime decides how quickly
    /// it stops; the session leaves `Executing` once the evaluation returns.
    pub async fn cancel(&self) -> bool {
        match &self.inner.lock().await.current {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Makes sure this session holds the shared runtime.
    ///
    /// - handle already held → returned immediately;
    /// - otherwise → `Loading`, waits on the loader, then `Ready` or `Errored`.
    ///
    /// Calling it again after a failure retries the load.
    pub async fn ensure_loaded(&self) -> Result<RuntimeRef, LoadError> {
        {
            let mut inner = self.inner.lock().await;
            if let Some(rt) = &inner.runtime {
                return Ok(Arc::clone(rt));
            }
            if inner.status != SessionStatus::Loading {
                self.transition(&mut inner, SessionStatus::Loading);
                self.publish(Event::new(EventKind::LoadRequested));
            }
        }

        let res = self.loader.ensure_loaded().await;

        let mut inner = self.inner.lock().await;
        match res {
            Ok(rt) => {
                let held = Arc::clone(inner.runtime.get_or_insert(rt));
                // A concurrent trigger may have recorded an earlier attempt's failure.
                if inner.status == SessionStatus::Errored {
                    self.transition(&mut inner, SessionStatus::Loading);
                }
                if inner.status == SessionStatus::Loading {
                    inner.error = None;
                    self.transition(&mut inner, SessionStatus::Ready);
                    info!(session = %self.name, runtime = held.name(), "session ready");
                    self.publish(Event::new(EventKind::LoadSucceeded).with_reason(held.name()));
                }
                Ok(held)
            }
            Err(err) => {
                // Another trigger on this session may have settled it already.
                if inner.status == SessionStatus::Loading {
                    warn!(session = %self.name, error = %err, "session load failed");
                    self.record_error(&mut inner, err.to_string()).await;
                    self.transition(&mut inner, SessionStatus::Errored);
                    self.publish(Event::new(EventKind::LoadFailed).with_reason(err.to_string()));
                }
                Err(err)
            }
        }
    }

    /// Runs `code` and captures its output.
    ///
    /// Resolves once the run completes. A user-code exception is appended to the
    /// transcript as `"Error: <message>"` and recorded in [`Session::error`]; it
    /// is **not** returned as an error. Errors are returned only when the
    /// session is not ready or the runtime broke underneath the run.
    pub async fn execute(&self, code: &str) -> Result<(), SessionError> {
        let (runtime, token, run) = {
            let mut inner = self.inner.lock().await;
            let Some(runtime) = inner.runtime.clone() else {
                debug!(session = %self.name, "execute ignored: no runtime loaded");
                self.publish(Event::new(EventKind::ExecutionSkipped));
                return Ok(());
            };
            if !inner.status.accepts_execution() {
                let status = inner.status;
                warn!(session = %self.name, %status, "execute rejected");
                self.publish(Event::new(EventKind::ExecutionRejected).with_status(status));
                return Err(SessionError::NotReady { status });
            }

            self.transition(&mut inner, SessionStatus::Executing);
            inner.error = None;
            self.output.reset().await;
            self.publish(Event::new(EventKind::OutputReset));

            let token = self.root.child_token();
            inner.current = Some(token.clone());
            let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
            self.publish(Event::new(EventKind::ExecutionStarted).with_attempt(run));
            (runtime, token, run)
        };

        debug!(session = %self.name, run, bytes = code.len(), "execution started");
        let started = Instant::now();
        let capture = Capture {
            buffer: &self.output,
            bus: &self.bus,
            session: &self.name,
        };
        let res = runner::run_once(
            runtime.as_ref(),
            code,
            capture,
            &token,
            self.cfg.execution_timeout(),
        )
        .await;
        let elapsed = started.elapsed();

        let mut inner = self.inner.lock().await;
        inner.current = None;
        match res {
            Ok(()) => {
                self.transition(&mut inner, SessionStatus::Ready);
                self.publish(
                    Event::new(EventKind::ExecutionFinished)
                        .with_attempt(run)
                        .with_elapsed(elapsed),
                );
            }
            Err(EvalError::Canceled) => {
                self.transition(&mut inner, SessionStatus::Ready);
                self.publish(
                    Event::new(EventKind::ExecutionCancelled)
                        .with_attempt(run)
                        .with_elapsed(elapsed),
                );
            }
            Err(EvalError::Raised { message }) => {
                debug!(session = %self.name, run, error = %message, "user code raised");
                self.record_error(&mut inner, message.clone()).await;
                self.transition(&mut inner, SessionStatus::Ready);
                self.publish(
                    Event::new(EventKind::ExecutionRaised)
                        .with_attempt(run)
                        .with_elapsed(elapsed)
                        .with_reason(message),
                );
            }
            Err(EvalError::Timeout { timeout }) => {
                warn!(session = %self.name, run, ?timeout, "execution timed out");
                let err = EvalError::Timeout { timeout };
                self.record_error(&mut inner, err.to_string()).await;
                self.transition(&mut inner, SessionStatus::Ready);
                self.publish(
                    Event::new(EventKind::ExecutionTimedOut)
                        .with_attempt(run)
                        .with_timeout(timeout),
                );
            }
            Err(err) => {
                warn!(session = %self.name, run, label = err.as_label(), error = %err, "runtime broke during execution");
                self.record_error(&mut inner, err.to_string()).await;
                inner.runtime = None;
                self.loader.invalidate(&runtime).await;
                self.transition(&mut inner, SessionStatus::Errored);
                self.publish(
                    Event::new(EventKind::RuntimeBroken)
                        .with_attempt(run)
                        .with_reason(err.to_string()),
                );
                return Err(SessionError::Runtime(err));
            }
        }
        Ok(())
    }

    /// Applies a defined transition and publishes it; anything else is logged and ignored.
    fn transition(&self, inner: &mut Inner, next: SessionStatus) -> bool {
        let from = inner.status;
        if !from.can_transition_to(next) {
            warn!(session = %self.name, %from, to = %next, "invalid status transition ignored");
            return false;
        }
        inner.status = next;
        self.publish(Event::new(EventKind::StatusChanged).with_status(next));
        true
    }

    /// Stores the error record and appends its transcript line.
    async fn record_error(&self, inner: &mut Inner, message: String) {
        let line = OutputLine::error(&message);
        inner.error = Some(Arc::from(message));
        self.output.append(line.clone()).await;
        self.publish(Event::new(EventKind::OutputAppended).with_line(line));
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_session(Arc::clone(&self.name)));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Stops the subscriber listener and signals any run still in flight.
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::{LoaderConfig, same_runtime};
    use crate::subscribers::Subscribe;
    use crate::testing::ScriptProvider;

    fn loader(provider: &Arc<ScriptProvider>) -> Arc<Loader> {
        Loader::arc(provider.clone(), LoaderConfig::default())
    }

    async fn ready_session(provider: &Arc<ScriptProvider>) -> Arc<Session> {
        let session = Session::new(loader(provider), SessionConfig::default());
        session.ensure_loaded().await.ok().unwrap();
        session
    }

    fn statuses(rx: &mut broadcast::Receiver<Event>) -> Vec<SessionStatus> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::StatusChanged {
                out.extend(ev.status);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_sessions_share_one_boot() {
        let provider = ScriptProvider::arc().with_delay(Duration::from_millis(20));
        let loader = loader(&provider);
        let a = Session::new(loader.clone(), SessionConfig::default());
        let b = Session::new(loader, SessionConfig::default());

        let (ra, rb) = tokio::join!(a.ensure_loaded(), b.ensure_loaded());
        let (ra, rb) = (ra.ok().unwrap(), rb.ok().unwrap());

        assert_eq!(provider.boots(), 1);
        assert!(same_runtime(&ra, &rb));
        assert_eq!(a.status().await, SessionStatus::Ready);
        assert_eq!(b.status().await, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_output_in_emission_order() {
        let session = ready_session(&ScriptProvider::arc()).await;

        session.execute("print a\nprint b\nprint c").await.unwrap();

        assert_eq!(session.buffer().texts().await, vec!["a", "b", "c"]);
        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(session.error().await, None);
    }

    #[tokio::test]
    async fn test_each_run_resets_the_buffer() {
        let session = ready_session(&ScriptProvider::arc()).await;

        session.execute("print x").await.unwrap();
        session.execute("print y").await.unwrap();

        assert_eq!(session.buffer().texts().await, vec!["y"]);
    }

    #[tokio::test]
    async fn test_user_exception_keeps_session_usable() {
        let session = ready_session(&ScriptProvider::arc()).await;

        session.execute("print before\nraise boom").await.unwrap();

        let out = session.output().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].as_str(), "Error: boom");
        assert!(out[1].is_error());
        assert_eq!(session.error().await.as_deref(), Some("boom"));
        assert_eq!(session.status().await, SessionStatus::Ready);

        session.execute("print again").await.unwrap();
        assert_eq!(session.buffer().texts().await, vec!["again"]);
        assert_eq!(session.error().await, None);
    }

    #[tokio::test]
    async fn test_execute_without_runtime_is_noop() {
        let provider = ScriptProvider::arc();
        let session = Session::new(loader(&provider), SessionConfig::default());
        let mut rx = session.subscribe();

        session.execute("print ignored").await.unwrap();

        assert!(session.buffer().is_empty().await);
        assert_eq!(session.status().await, SessionStatus::Uninitialized);
        assert_eq!(provider.boots(), 0);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::ExecutionSkipped);
    }

    #[tokio::test]
    async fn test_overlapping_loads_recover_after_stale_failure() {
        let provider = ScriptProvider::arc()
            .with_delay(Duration::from_millis(10))
            .failing_boots(1);
        let session = Session::new(loader(&provider), SessionConfig::default());
        let mut rx = session.subscribe();

        // First trigger joins attempt #1, which fails before the second trigger arrives.
        let first = session.ensure_loaded();
        let second = session.ensure_loaded();
        tokio::pin!(first, second);
        assert!(futures::poll!(first.as_mut()).is_pending());
        while session.loader().is_loading().await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(futures::poll!(second.as_mut()).is_pending());

        assert!(first.await.is_err());
        assert!(second.await.is_ok());

        assert_eq!(provider.boots(), 2);
        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(session.error().await, None);
        session.execute("print ok").await.unwrap();
        assert_eq!(session.buffer().texts().await, vec!["ok"]);

        use SessionStatus::*;
        assert_eq!(
            statuses(&mut rx),
            vec![Loading, Errored, Loading, Ready, Executing, Ready]
        );
    }

    #[tokio::test]
    async fn test_load_failure_then_retry() {
        let provider = ScriptProvider::arc().failing_boots(1);
        let session = Session::new(loader(&provider), SessionConfig::default());
        let mut rx = session.subscribe();

        let err = session.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, LoadError::Boot { .. }));
        assert_eq!(session.status().await, SessionStatus::Errored);
        assert_eq!(session.error().await, Some(err.to_string()));
        let last = session.buffer().last().await.unwrap();
        assert_eq!(last.as_str(), format!("Error: {err}"));

        session.ensure_loaded().await.ok().unwrap();
        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(session.error().await, None);
        assert_eq!(provider.boots(), 2);

        use SessionStatus::*;
        assert_eq!(statuses(&mut rx), vec![Loading, Errored, Loading, Ready]);
    }

    #[tokio::test]
    async fn test_broken_runtime_errors_session_and_reloads() {
        let provider = ScriptProvider::arc();
        let session = ready_session(&provider).await;

        let err = session.execute("print a\nbreak kernel died").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Runtime(EvalError::Broken { .. })
        ));
        assert_eq!(session.status().await, SessionStatus::Errored);
        assert!(session.loader().handle().await.is_none());
        assert_eq!(
            session.buffer().texts().await,
            vec!["a", "Error: runtime failure: kernel died"]
        );

        // No handle: the request is ignored rather than rejected.
        session.execute("print x").await.unwrap();
        assert_eq!(session.status().await, SessionStatus::Errored);

        session.ensure_loaded().await.ok().unwrap();
        assert_eq!(provider.boots(), 2);
        assert_eq!(session.status().await, SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_timeout_returns_to_ready() {
        let provider = ScriptProvider::arc();
        let cfg = SessionConfig {
            timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let session = Session::new(loader(&provider), cfg);
        session.ensure_loaded().await.ok().unwrap();

        session.execute("print partial\nhang 5000").await.unwrap();

        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(
            session.buffer().texts().await,
            vec!["partial", "Error: timed out after 20ms"]
        );
        assert_eq!(
            session.error().await.as_deref(),
            Some("timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn test_abandoned_run_does_not_leak_into_next() {
        let cfg = SessionConfig {
            timeout: Duration::from_millis(10),
            ..SessionConfig::default()
        };
        let session = Session::new(loader(&ScriptProvider::arc()), cfg);
        session.ensure_loaded().await.ok().unwrap();

        session.execute("late 30 ghost\nhang 5000").await.unwrap();
        session.execute("print next").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(session.buffer().texts().await, vec!["next"]);
    }

    #[tokio::test]
    async fn test_overlap_rejected_and_cancel() {
        let session = ready_session(&ScriptProvider::arc()).await;
        assert!(!session.cancel().await);

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute("print started\nsleep 5000").await })
        };
        while session.status().await != SessionStatus::Executing {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let err = session.execute("print second").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotReady {
                status: SessionStatus::Executing
            }
        ));

        assert!(session.cancel().await);
        running.await.unwrap().unwrap();

        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(session.error().await, None);
        assert_eq!(session.buffer().texts().await, vec!["started"]);
    }

    #[tokio::test]
    async fn test_reset_output_keeps_status() {
        let session = ready_session(&ScriptProvider::arc()).await;
        session.execute("raise boom").await.unwrap();

        session.reset_output().await;

        assert!(session.buffer().is_empty().await);
        assert_eq!(session.error().await, None);
        assert_eq!(session.status().await, SessionStatus::Ready);
    }

    #[derive(Default)]
    struct Lines {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Subscribe for Lines {
        async fn on_event(&self, event: &Event) {
            if let Some(line) = &event.line {
                self.seen.lock().unwrap().push(line.text.to_string());
            }
        }

        fn name(&self) -> &'static str {
            "lines"
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_captured_lines() {
        let lines = Arc::new(Lines::default());
        let session = Session::builder(loader(&ScriptProvider::arc()))
            .with_config(SessionConfig {
                name: "editor".into(),
                ..SessionConfig::default()
            })
            .with_subscribers(vec![lines.clone()])
            .build();
        assert_eq!(session.name(), "editor");

        session.ensure_loaded().await.ok().unwrap();
        session.execute("print one\nwarn two").await.unwrap();

        for _ in 0..100 {
            if lines.seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*lines.seen.lock().unwrap(), vec!["one", "two"]);
    }
}
