//! # Runtime abstraction.
//!
//! This module defines the two seams between the session manager and a concrete
//! interpreter:
//!
//! - [`RuntimeProvider`] fetches and initializes the base runtime (the heavyweight step);
//! - [`Runtime`] loads extension packages and evaluates source snippets.
//!
//! The shared handle type is [`RuntimeRef`], an `Arc<dyn Runtime>` published once
//! by the [`Loader`](crate::Loader) and shared by every session.
//!
//! An evaluation receives a fresh [`OutputSink`] and a [`CancellationToken`]. It
//! should push every line as soon as it is produced and stop promptly once the
//! token is cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{EvalError, LoadError};
use crate::output::OutputSink;

/// Shared handle to the initialized runtime.
pub type RuntimeRef = Arc<dyn Runtime>;

/// # An initialized interpreter.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use replvisor::{EvalError, LoadError, OutputSink, Runtime};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Runtime for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     async fn load_package(&self, _package: &str) -> Result<(), LoadError> {
///         Ok(())
///     }
///
///     async fn evaluate(
///         &self,
///         code: &str,
///         sink: OutputSink,
///         ctx: CancellationToken,
///     ) -> Result<(), EvalError> {
///         for line in code.lines() {
///             if ctx.is_cancelled() {
///                 return Err(EvalError::Canceled);
///             }
///             sink.stdout(line);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Runtime: Send + Sync + 'static {
    /// Returns a stable, human-readable runtime name.
    fn name(&self) -> &str;

    /// Loads one extension package into the runtime.
    ///
    /// Called by the loader for each configured package, in order, before the
    /// handle is published.
    async fn load_package(&self, package: &str) -> Result<(), LoadError>;

    /// Evaluates `code`, pushing each emitted line into `sink` as it happens.
    ///
    /// Returns:
    /// - `Ok(())` when the code ran to completion;
    /// - `Err(EvalError::Raised)` when the code raised an exception;
    /// - `Err(EvalError::Canceled)` when it stopped because `ctx` was cancelled;
    /// - `Err(EvalError::Broken)` when the runtime itself is no longer usable.
    async fn evaluate(
        &self,
        code: &str,
        sink: OutputSink,
        ctx: CancellationToken,
    ) -> Result<(), EvalError>;
}

/// # Source of the runtime.
///
/// `boot` runs at most once concurrently per [`Loader`](crate::Loader); it is
/// retried only after a failure (or after the handle was invalidated).
#[async_trait]
pub trait RuntimeProvider: Send + Sync + 'static {
    /// Returns a stable, human-readable provider name.
    fn name(&self) -> &str;

    /// Fetches and initializes the base runtime.
    async fn boot(&self) -> Result<RuntimeRef, LoadError>;
}
