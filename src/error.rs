//! Error types used by the loader, the runtimes and sessions.
//!
//! This module defines three error enums:
//!
//! - [`LoadError`] - the runtime failed to boot or to load a package.
//! - [`EvalError`] - a single evaluation did not complete normally.
//! - [`SessionError`] - what [`Session::execute`](crate::Session::execute) returns to the host.
//!
//! `LoadError` and `EvalError` provide helper methods (`as_label`, `as_message`)
//! for logging, plus classification helpers such as [`LoadError::is_retryable`]
//! and [`EvalError::is_user_error`].

use std::time::Duration;
use thiserror::Error;

use crate::core::SessionStatus;

/// # Errors produced while bringing the runtime up.
///
/// Every variant is retryable: the loader clears its in-flight marker on
/// failure and the next `ensure_loaded()` starts a fresh attempt.
///
/// `LoadError` is `Clone` because one failed attempt is reported to every
/// caller that was waiting on it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The base runtime could not be fetched or initialized.
    #[error("runtime boot failed: {error}")]
    Boot {
        /// The underlying error message.
        error: String,
    },

    /// The base runtime came up but an extension package did not load.
    #[error("package '{package}' failed to load: {error}")]
    Package {
        /// Name of the package that failed.
        package: String,
        /// The underlying error message.
        error: String,
    },

    /// The whole attempt exceeded the configured load timeout.
    #[error("runtime load timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The load task ended without producing a result (panicked or was aborted).
    #[error("runtime load aborted: {error}")]
    Aborted {
        /// Details from the join error.
        error: String,
    },
}

impl LoadError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use replvisor::LoadError;
    ///
    /// let err = LoadError::Boot { error: "offline".into() };
    /// assert_eq!(err.as_label(), "load_boot_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::Boot { .. } => "load_boot_failed",
            LoadError::Package { .. } => "load_package_failed",
            LoadError::Timeout { .. } => "load_timeout",
            LoadError::Aborted { .. } => "load_aborted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoadError::Boot { error } => format!("boot: {error}"),
            LoadError::Package { package, error } => format!("package {package}: {error}"),
            LoadError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            LoadError::Aborted { error } => format!("aborted: {error}"),
        }
    }

    /// Indicates whether a later `ensure_loaded()` may succeed.
    ///
    /// Always `true` today; kept as a method so callers do not hard-code it.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// # Errors produced by a single evaluation.
///
/// Only [`EvalError::Broken`] is an infrastructure failure; every other
/// variant leaves the runtime usable for the next submission.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The submitted code raised an exception.
    #[error("{message}")]
    Raised {
        /// Message of the exception, as the runtime reports it.
        message: String,
    },

    /// The evaluation exceeded the session's execution timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The evaluation observed cancellation and stopped early.
    #[error("execution cancelled")]
    Canceled,

    /// The runtime itself is no longer usable (crashed, lost, corrupted).
    #[error("runtime failure: {error}")]
    Broken {
        /// The underlying error message.
        error: String,
    },
}

impl EvalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use replvisor::EvalError;
    ///
    /// let err = EvalError::Raised { message: "boom".into() };
    /// assert_eq!(err.as_label(), "eval_raised");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EvalError::Raised { .. } => "eval_raised",
            EvalError::Timeout { .. } => "eval_timeout",
            EvalError::Canceled => "eval_canceled",
            EvalError::Broken { .. } => "eval_broken",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EvalError::Raised { message } => format!("raised: {message}"),
            EvalError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            EvalError::Canceled => "execution cancelled".to_string(),
            EvalError::Broken { error } => format!("broken: {error}"),
        }
    }

    /// `true` when the failure belongs to the submitted code rather than the runtime.
    ///
    /// # Example
    /// ```
    /// use replvisor::EvalError;
    ///
    /// assert!(EvalError::Raised { message: "boom".into() }.is_user_error());
    /// assert!(!EvalError::Broken { error: "gone".into() }.is_user_error());
    /// ```
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EvalError::Broken { .. })
    }
}

/// Errors returned to the host by [`Session::execute`](crate::Session::execute).
///
/// User-code exceptions are not errors at this level; they end up in the
/// transcript and in [`Session::error`](crate::Session::error).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session is not accepting submissions in its current status.
    #[error("session not ready (status: {status})")]
    NotReady {
        /// Status observed when the request arrived.
        status: SessionStatus,
    },

    /// The runtime failed underneath a running execution.
    #[error(transparent)]
    Runtime(EvalError),
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::NotReady { .. } => "session_not_ready",
            SessionError::Runtime(e) => e.as_label(),
        }
    }
}
