//! # Single-flight runtime loader.
//!
//! [`Loader`] hands out the one initialized [`RuntimeRef`] of the process. The
//! heavyweight step (provider boot + extension packages) runs on its own task,
//! at most once concurrently; every caller that arrives while it is in flight
//! attaches to the same attempt and observes the same outcome.
//!
//! ## Slot states
//! ```text
//!            ensure_loaded()                    load task: Ok(rt)
//!   Empty ──────────────────► Loading{attempt} ──────────────────► Ready(rt)
//!     ▲                            │                                   │
//!     │        load task: Err      │                                   │
//!     └────────────────────────────┘◄──────── invalidate(&rt) ─────────┘
//! ```
//!
//! ## Rules
//! - The slot is mutated by the load task when it settles and by `invalidate`;
//!   callers only read it or install a new `Loading` attempt.
//! - A settle is applied only if the slot still holds the same attempt.
//! - The load task keeps running if every waiting caller is dropped.
//! - On failure the slot returns to `Empty`, so the next call starts a new attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, info, warn};

use crate::core::LoaderConfig;
use crate::error::LoadError;
use crate::runtime::{RuntimeProvider, RuntimeRef};

type SharedLoad = Shared<BoxFuture<'static, Result<RuntimeRef, LoadError>>>;

static GLOBAL: OnceLock<Arc<Loader>> = OnceLock::new();

enum Slot {
    Empty,
    Loading { attempt: u64, result: SharedLoad },
    Ready(RuntimeRef),
}

/// Process-wide, lazily initialized runtime guard.
///
/// # Example
/// ```no_run
/// use replvisor::{Loader, LoaderConfig, ProcessConfig, ProcessProvider};
///
/// # async fn demo() -> Result<(), replvisor::LoadError> {
/// let loader = Loader::arc(
///     ProcessProvider::arc(ProcessConfig::default()),
///     LoaderConfig::default().with_package("json"),
/// );
///
/// let a = loader.ensure_loaded().await?;
/// let b = loader.ensure_loaded().await?;
/// assert!(replvisor::same_runtime(&a, &b));
/// # Ok(())
/// # }
/// ```
pub struct Loader {
    provider: Arc<dyn RuntimeProvider>,
    cfg: LoaderConfig,
    slot: Arc<Mutex<Slot>>,
    attempts: AtomicU64,
}

impl Loader {
    /// Creates a loader that has not started anything yet.
    pub fn new(provider: Arc<dyn RuntimeProvider>, cfg: LoaderConfig) -> Self {
        Self {
            provider,
            cfg,
            slot: Arc::new(Mutex::new(Slot::Empty)),
            attempts: AtomicU64::new(0),
        }
    }

    /// Creates the loader and returns it as a shared handle.
    pub fn arc(provider: Arc<dyn RuntimeProvider>, cfg: LoaderConfig) -> Arc<Self> {
        Arc::new(Self::new(provider, cfg))
    }

    /// Returns the process-wide loader, creating it with `init` on first use.
    ///
    /// Later calls return the same instance and never run `init`.
    pub fn global(init: impl FnOnce() -> Loader) -> Arc<Loader> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(init())))
    }

    /// Returns the initialized runtime, loading it if necessary.
    ///
    /// - published handle → returned immediately;
    /// - attempt in flight → waits for that attempt;
    /// - otherwise → starts a new attempt and waits for it.
    pub async fn ensure_loaded(&self) -> Result<RuntimeRef, LoadError> {
        let pending = {
            let mut slot = self.slot.lock().await;
            if let Slot::Ready(rt) = &*slot {
                return Ok(Arc::clone(rt));
            }
            if let Slot::Loading { attempt, result } = &*slot {
                debug!(attempt = *attempt, "joining in-flight runtime load");
                result.clone()
            } else {
                let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                let result = self.start(attempt);
                *slot = Slot::Loading {
                    attempt,
                    result: result.clone(),
                };
                result
            }
        };
        pending.await
    }

    /// Returns the published runtime without loading anything.
    pub async fn handle(&self) -> Option<RuntimeRef> {
        match &*self.slot.lock().await {
            Slot::Ready(rt) => Some(Arc::clone(rt)),
            _ => None,
        }
    }

    /// `true` while an attempt is in flight.
    pub async fn is_loading(&self) -> bool {
        matches!(&*self.slot.lock().await, Slot::Loading { .. })
    }

    /// Drops the published runtime if it is still `rt`.
    ///
    /// The next `ensure_loaded()` boots a fresh runtime. Returns `true` if the
    /// slot was cleared; a handle that was already replaced is left alone.
    pub async fn invalidate(&self, rt: &RuntimeRef) -> bool {
        let mut slot = self.slot.lock().await;
        let current = matches!(&*slot, Slot::Ready(current) if same_runtime(current, rt));
        if !current {
            return false;
        }
        warn!(runtime = rt.name(), "runtime invalidated");
        *slot = Slot::Empty;
        true
    }

    /// Number of load attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.cfg
    }

    /// Spawns the load task for `attempt` and wraps its join handle in a shared future.
    fn start(&self, attempt: u64) -> SharedLoad {
        let provider = Arc::clone(&self.provider);
        let packages = self.cfg.packages.clone();
        let timeout = self.cfg.load_timeout();
        let slot = Arc::clone(&self.slot);

        info!(provider = provider.name(), attempt, "runtime load started");
        let task_slot = Arc::clone(&slot);
        let join = tokio::spawn(async move {
            let res = match timeout {
                Some(dur) => time::timeout(dur, boot(provider.as_ref(), &packages))
                    .await
                    .unwrap_or(Err(LoadError::Timeout { timeout: dur })),
                None => boot(provider.as_ref(), &packages).await,
            };
            match &res {
                Ok(rt) => info!(runtime = rt.name(), attempt, "runtime ready"),
                Err(err) => warn!(attempt, label = err.as_label(), error = %err, "runtime load failed"),
            }
            settle(&task_slot, attempt, &res).await;
            res
        });

        async move {
            match join.await {
                Ok(res) => res,
                Err(err) => {
                    // The task died before settling; clear the slot so a retry is possible.
                    let res = Err(LoadError::Aborted {
                        error: err.to_string(),
                    });
                    settle(&slot, attempt, &res).await;
                    res
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Boots the base runtime, then loads every package in order.
async fn boot(
    provider: &dyn RuntimeProvider,
    packages: &[String],
) -> Result<RuntimeRef, LoadError> {
    let rt = provider.boot().await?;
    for package in packages {
        debug!(runtime = rt.name(), package = %package, "loading package");
        rt.load_package(package).await?;
    }
    Ok(rt)
}

/// Publishes the outcome of `attempt` if the slot still belongs to it.
async fn settle(slot: &Mutex<Slot>, attempt: u64, res: &Result<RuntimeRef, LoadError>) {
    let mut slot = slot.lock().await;
    let current = matches!(&*slot, Slot::Loading { attempt: a, .. } if *a == attempt);
    if !current {
        return;
    }
    *slot = match res {
        Ok(rt) => Slot::Ready(Arc::clone(rt)),
        Err(_) => Slot::Empty,
    };
}

/// `true` if both handles point at the same runtime instance.
pub fn same_runtime(a: &RuntimeRef, b: &RuntimeRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
