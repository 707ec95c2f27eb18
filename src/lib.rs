//! # replvisor
//!
//! **Replvisor** manages embedded interpreter sessions for interactive hosts
//! (notebooks, editors, playgrounds).
//!
//! One heavyweight interpreter runtime is initialized at most once per process
//! and shared; any number of [`Session`]s borrow it. Each session has its own
//! status, captured output and error record, and runs one snippet at a time.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Session    │   │   Session    │   │   Session    │
//!     │  (editor A)  │   │  (editor B)  │   │  (console)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ ensure_loaded()  │                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Loader (process-wide, single-flight)                             │
//! │  - Slot: Empty │ Loading{attempt, shared result} │ Ready(runtime) │
//! │  - RuntimeProvider::boot() + Runtime::load_package() per package  │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  RuntimeRef            │
//!                       │  (Arc<dyn Runtime>)    │
//!                       └────────────────────────┘
//!
//! Per session:
//!   execute(code) ──► runner::run_once ──► Runtime::evaluate(code, OutputSink, token)
//!                                                │
//!                      OutputBuffer ◄── lines ───┘
//!                      Bus (broadcast) ──► subscriber_listener ──► SubscriberSet
//!                                                              ┌─────────┼─────────┐
//!                                                              ▼         ▼         ▼
//!                                                           worker1  worker2  workerN
//! ```
//!
//! ### Session lifecycle
//! ```text
//! Uninitialized ──ensure_loaded()──► Loading ──ok──► Ready ◄──────────────┐
//!                                       │              │ execute(code)    │
//!                                       │ err          ▼                  │ ok / raised /
//!                                       ▼          Executing ─────────────┘ timeout / cancel
//!        ensure_loaded() (retry) ◄── Errored ◄────────┘ runtime broke
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------------|---------------------------------------------|
//! | **Loading**       | One shared runtime, concurrent callers share one attempt.         | [`Loader`], [`LoaderConfig`]                |
//! | **Sessions**      | Status machine, per-run output reset, error record.               | [`Session`], [`SessionStatus`]              |
//! | **Runtimes**      | Plug in any interpreter; a child-process runtime is built in.     | [`Runtime`], [`RuntimeProvider`], [`ProcessProvider`] |
//! | **Output**        | Ordered transcript of stdout, stderr and error lines.             | [`OutputBuffer`], [`OutputLine`]            |
//! | **Subscriber API**| Hook into session events (logging, rendering, custom subscribers).| [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for loading, evaluation and sessions.                | [`LoadError`], [`EvalError`], [`SessionError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use replvisor::{
//!     EvalError, LoadError, Loader, LoaderConfig, OutputSink, ProviderFn, Runtime, RuntimeRef,
//!     Session, SessionConfig, SessionStatus,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Runtime for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     async fn load_package(&self, _: &str) -> Result<(), LoadError> { Ok(()) }
//!     async fn evaluate(&self, code: &str, sink: OutputSink, _: CancellationToken) -> Result<(), EvalError> {
//!         for line in code.lines() {
//!             sink.stdout(line);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ProviderFn::arc("echo", || async { Ok::<RuntimeRef, LoadError>(Arc::new(Echo)) });
//!     let loader = Loader::arc(provider, LoaderConfig::default());
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn replvisor::Subscribe>> = vec![Arc::new(replvisor::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn replvisor::Subscribe>> = Vec::new();
//!
//!     let session = Session::builder(loader)
//!         .with_config(SessionConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     session.ensure_loaded().await?;
//!     session.execute("hello\nworld").await?;
//!
//!     assert_eq!(session.status().await, SessionStatus::Ready);
//!     assert_eq!(session.buffer().texts().await, vec!["hello", "world"]);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod output;
mod runtime;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use core::{
    Loader, LoaderConfig, Session, SessionBuilder, SessionConfig, SessionStatus, same_runtime,
};
pub use error::{EvalError, LoadError, SessionError};
pub use events::{Bus, Event, EventKind};
pub use output::{LineKind, OutputBuffer, OutputLine, OutputSink};
pub use runtime::{
    ProcessConfig, ProcessProvider, ProcessRuntime, ProviderFn, Runtime, RuntimeProvider,
    RuntimeRef,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
