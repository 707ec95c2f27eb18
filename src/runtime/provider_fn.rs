//! # Function-backed provider (`ProviderFn`)
//!
//! [`ProviderFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh boot future
//! per attempt. Useful for hosts that already know how to construct their
//! runtime and for tests.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use replvisor::{
//!     EvalError, LoadError, OutputSink, ProviderFn, Runtime, RuntimeProvider, RuntimeRef,
//! };
//!
//! struct Noop;
//!
//! #[async_trait]
//! impl Runtime for Noop {
//!     fn name(&self) -> &str { "noop" }
//!     async fn load_package(&self, _: &str) -> Result<(), LoadError> { Ok(()) }
//!     async fn evaluate(&self, _: &str, _: OutputSink, _: CancellationToken) -> Result<(), EvalError> {
//!         Ok(())
//!     }
//! }
//!
//! let provider = ProviderFn::arc("noop", || async { Ok::<RuntimeRef, LoadError>(Arc::new(Noop)) });
//! assert_eq!(provider.name(), "noop");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::runtime::{RuntimeProvider, RuntimeRef};

/// Function-backed provider implementation.
///
/// Wraps a closure that *creates* a new boot future per attempt.
#[derive(Debug)]
pub struct ProviderFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ProviderFn<F> {
    /// Creates a new function-backed provider.
    ///
    /// Prefer [`ProviderFn::arc`] when you immediately need a shared handle.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the provider and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> RuntimeProvider for ProviderFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RuntimeRef, LoadError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn boot(&self) -> Result<RuntimeRef, LoadError> {
        (self.f)().await
    }
}
