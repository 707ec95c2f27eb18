//! Scripted runtime used by the unit tests.
//!
//! A script is a list of commands, one per line:
//!
//! ```text
//! print <text>   emit a stdout line
//! warn <text>    emit a stderr line
//! raise <msg>    fail with EvalError::Raised
//! break <msg>    fail with EvalError::Broken
//! sleep <ms>     wait, honoring cancellation
//! hang <ms>      wait, ignoring cancellation
//! late <ms> <text> emit a stdout line from a detached task after <ms>
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{EvalError, LoadError};
use crate::output::OutputSink;
use crate::runtime::{Runtime, RuntimeProvider, RuntimeRef};

pub(crate) struct ScriptRuntime {
    packages: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Runtime for ScriptRuntime {
    fn name(&self) -> &str {
        "script"
    }

    async fn load_package(&self, package: &str) -> Result<(), LoadError> {
        if package.starts_with("bad") {
            return Err(LoadError::Package {
                package: package.to_string(),
                error: "no such package".to_string(),
            });
        }
        self.packages.lock().unwrap().push(package.to_string());
        Ok(())
    }

    async fn evaluate(
        &self,
        code: &str,
        sink: OutputSink,
        ctx: CancellationToken,
    ) -> Result<(), EvalError> {
        for line in code.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            match cmd {
                "print" => {
                    sink.stdout(arg);
                }
                "warn" => {
                    sink.stderr(arg);
                }
                "raise" => {
                    return Err(EvalError::Raised {
                        message: arg.to_string(),
                    });
                }
                "break" => {
                    return Err(EvalError::Broken {
                        error: arg.to_string(),
                    });
                }
                "sleep" => {
                    let ms = arg.parse().unwrap_or(0);
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(EvalError::Canceled),
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    }
                }
                "late" => {
                    let (ms, text) = arg.split_once(' ').unwrap_or((arg, ""));
                    let delay = Duration::from_millis(ms.parse().unwrap_or(0));
                    let (sink, text) = (sink.clone(), text.to_string());
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        sink.stdout(text);
                    });
                }
                "hang" => {
                    let ms = arg.parse().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                other => {
                    return Err(EvalError::Raised {
                        message: format!("unknown command: {other}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Provider that counts boots and can be told to fail or to be slow.
#[derive(Default)]
pub(crate) struct ScriptProvider {
    boots: AtomicU64,
    failing: AtomicUsize,
    delay: Mutex<Duration>,
    packages: Arc<Mutex<Vec<String>>>,
}

impl ScriptProvider {
    pub(crate) fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every boot sleeps for `delay` first.
    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// The next `n` boots fail.
    pub(crate) fn failing_boots(self: Arc<Self>, n: usize) -> Arc<Self> {
        self.failing.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn boots(&self) -> u64 {
        self.boots.load(Ordering::SeqCst)
    }

    /// Packages loaded into any runtime booted by this provider, in order.
    pub(crate) fn packages(&self) -> Vec<String> {
        self.packages.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuntimeProvider for ScriptProvider {
    fn name(&self) -> &str {
        "script-provider"
    }

    async fn boot(&self) -> Result<RuntimeRef, LoadError> {
        let id = self.boots.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LoadError::Boot {
                error: format!("scripted boot failure #{id}"),
            });
        }

        Ok(Arc::new(ScriptRuntime {
            packages: Arc::clone(&self.packages),
        }))
    }
}
