//! # Interpreter runtimes.
//!
//! This module provides the runtime seams and the built-in implementation:
//! - [`Runtime`] - trait for an initialized interpreter (packages, evaluation)
//! - [`RuntimeProvider`] - trait for booting a runtime
//! - [`RuntimeRef`] - shared handle to a runtime (`Arc<dyn Runtime>`)
//! - [`ProviderFn`] - closure-backed provider
//! - [`ProcessProvider`] / [`ProcessRuntime`] - interpreter binary driven as a child process

mod process;
mod provider_fn;
mod runtime;

pub use process::{ProcessConfig, ProcessProvider, ProcessRuntime};
pub use provider_fn::ProviderFn;
pub use runtime::{Runtime, RuntimeProvider, RuntimeRef};
