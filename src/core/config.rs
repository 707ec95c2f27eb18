//! # Loader and session configuration.
//!
//! Provides [`LoaderConfig`] and [`SessionConfig`], plain structs with public
//! fields and `Default` impls.
//!
//! ## Sentinel values
//! - `LoaderConfig::timeout = 0s` → the load attempt may take as long as it needs
//! - `SessionConfig::timeout = 0s` → executions run until they finish
//! - `SessionConfig::bus_capacity` is clamped to a minimum of 1

use std::borrow::Cow;
use std::time::Duration;

/// Configuration for the process-wide [`Loader`](crate::Loader).
///
/// ## Field semantics
/// - `packages`: extension packages loaded, in order, after the base runtime boots
/// - `timeout`: upper bound for one whole attempt (boot + packages); `0s` = none
#[derive(Clone, Debug, Default)]
pub struct LoaderConfig {
    /// Extension packages required by the host, loaded in declaration order.
    pub packages: Vec<String>,

    /// Maximum duration of one load attempt.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the attempt fails with `LoadError::Timeout` once exceeded
    pub timeout: Duration,
}

impl LoaderConfig {
    /// Returns the load timeout as an `Option`.
    #[inline]
    pub fn load_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Builder-style helper adding one package to the list.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.push(package.into());
        self
    }
}

/// Configuration for one [`Session`](crate::Session).
///
/// ## Field semantics
/// - `name`: label attached to events and log records
/// - `bus_capacity`: session event ring buffer size (min 1)
/// - `timeout`: per-execution timeout (`0s` = none)
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Session label used in events and logs.
    pub name: Cow<'static, str>,

    /// Capacity of the session's event broadcast channel.
    ///
    /// Subscribers lagging more than `bus_capacity` events behind observe
    /// `Lagged` and skip older items. The output buffer itself is never lossy.
    pub bus_capacity: usize,

    /// Default execution timeout.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the run is cancelled and reported as `Error: timed out after ...`
    pub timeout: Duration,
}

impl SessionConfig {
    /// Returns the execution timeout as an `Option`.
    #[inline]
    pub fn execution_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SessionConfig {
    /// Default configuration:
    ///
    /// - `name = "session"`
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no timeout)
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("session"),
            bus_capacity: 1024,
            timeout: Duration::ZERO,
        }
    }
}
