//! # Interpreter driven as a child process.
//!
//! [`ProcessProvider`] boots a [`ProcessRuntime`] by probing an interpreter
//! binary (by default `python3 --version`). Every evaluation spawns the
//! interpreter with the snippet as its last argument (by default
//! `python3 -u -c <code>`), streams stdout line by line into the
//! [`OutputSink`], and keeps a bounded tail of stderr to describe failures.
//!
//! ## Outcome mapping
//! ```text
//! exit 0                    ─► Ok(())
//! exit != 0 / signal        ─► EvalError::Raised { last non-empty stderr line | exit status }
//! ctx cancelled             ─► child killed, EvalError::Canceled
//! spawn or pipe I/O failure ─► EvalError::Broken (the binary is gone or unusable)
//! ```
//!
//! The child is spawned with `kill_on_drop`, so dropping an evaluation future
//! (for example on timeout) also terminates the process.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EvalError, LoadError};
use crate::output::OutputSink;
use crate::runtime::{Runtime, RuntimeProvider, RuntimeRef};

const STDERR_TAIL_LINE_LIMIT: usize = 20;

/// How to invoke the interpreter binary.
///
/// ## Field semantics
/// - `program`: executable name or path
/// - `args`: arguments placed before the snippet on every evaluation
/// - `probe_args`: arguments of the boot probe; a zero exit means the runtime is usable
/// - `package_probe`: snippet evaluated to load a package; `{package}` is substituted
/// - `forward_stderr`: also stream stderr lines into the transcript (as `Stderr` lines)
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub probe_args: Vec<String>,
    pub package_probe: String,
    pub forward_stderr: bool,
}

impl Default for ProcessConfig {
    /// `python3 -u -c <code>`, probed with `python3 --version`, packages checked with `import {package}`.
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-u".to_string(), "-c".to_string()],
            probe_args: vec!["--version".to_string()],
            package_probe: "import {package}".to_string(),
            forward_stderr: false,
        }
    }
}

/// Boots [`ProcessRuntime`]s.
#[derive(Clone, Debug, Default)]
pub struct ProcessProvider {
    cfg: ProcessConfig,
}

impl ProcessProvider {
    pub fn new(cfg: ProcessConfig) -> Self {
        Self { cfg }
    }

    pub fn arc(cfg: ProcessConfig) -> Arc<Self> {
        Arc::new(Self::new(cfg))
    }
}

#[async_trait]
impl RuntimeProvider for ProcessProvider {
    fn name(&self) -> &str {
        &self.cfg.program
    }

    async fn boot(&self) -> Result<RuntimeRef, LoadError> {
        let out = Command::new(&self.cfg.program)
            .args(&self.cfg.probe_args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| LoadError::Boot {
                error: format!("failed to start {}: {err}", self.cfg.program),
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(LoadError::Boot {
                error: describe_failure(out.status, stderr.lines()),
            });
        }

        // Python 2 prints its version on stderr, so look at both.
        let version = [&out.stdout, &out.stderr]
            .into_iter()
            .find_map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        debug!(program = %self.cfg.program, version = %version, "interpreter probe succeeded");

        Ok(Arc::new(ProcessRuntime {
            cfg: self.cfg.clone(),
            version,
        }))
    }
}

/// A runtime that evaluates every snippet in a fresh interpreter process.
#[derive(Debug)]
pub struct ProcessRuntime {
    cfg: ProcessConfig,
    version: String,
}

impl ProcessRuntime {
    /// First non-empty line printed by the boot probe.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn command(&self, code: &str) -> Command {
        let mut cmd = Command::new(&self.cfg.program);
        cmd.args(&self.cfg.args)
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Runtime for ProcessRuntime {
    fn name(&self) -> &str {
        &self.cfg.program
    }

    async fn load_package(&self, package: &str) -> Result<(), LoadError> {
        let probe = self.cfg.package_probe.replace("{package}", package);
        let out = self
            .command(&probe)
            .output()
            .await
            .map_err(|err| LoadError::Package {
                package: package.to_string(),
                error: format!("failed to start {}: {err}", self.cfg.program),
            })?;

        if out.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Err(LoadError::Package {
                package: package.to_string(),
                error: describe_failure(out.status, stderr.lines()),
            })
        }
    }

    async fn evaluate(
        &self,
        code: &str,
        sink: OutputSink,
        ctx: CancellationToken,
    ) -> Result<(), EvalError> {
        let mut child = self.command(code).spawn().map_err(|err| EvalError::Broken {
            error: format!("failed to start {}: {err}", self.cfg.program),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EvalError::Broken {
            error: "interpreter missing stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| EvalError::Broken {
            error: "interpreter missing stderr".to_string(),
        })?;

        let forward = self.cfg.forward_stderr.then(|| sink.clone());
        let run = async {
            let (pumped, tail) = tokio::join!(pump_stdout(stdout, sink), read_stderr(stderr, forward));
            let status = child.wait().await;
            (pumped, tail, status)
        };

        let outcome = tokio::select! {
            _ = ctx.cancelled() => None,
            out = run => Some(out),
        };

        let Some((pumped, tail, status)) = outcome else {
            if let Err(err) = child.start_kill() {
                warn!(program = %self.cfg.program, error = %err, "failed to kill cancelled interpreter");
            }
            let _ = child.wait().await;
            return Err(EvalError::Canceled);
        };

        let broken = |err: std::io::Error| EvalError::Broken {
            error: format!("interpreter i/o failed: {err}"),
        };
        pumped.map_err(broken)?;
        let tail = tail.map_err(broken)?;
        let status = status.map_err(broken)?;

        if status.success() {
            Ok(())
        } else {
            Err(EvalError::Raised {
                message: describe_failure(status, tail.iter().map(String::as_str)),
            })
        }
    }
}

/// Forwards every stdout line into the sink, in order.
async fn pump_stdout<R>(reader: R, sink: OutputSink) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
        // Keep draining after the receiver is gone so the child never blocks on a full pipe.
        sink.stdout(line);
    }
    Ok(())
}

/// Collects the last stderr lines, optionally forwarding each one.
async fn read_stderr<R>(reader: R, forward: Option<OutputSink>) -> std::io::Result<VecDeque<String>>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINE_LIMIT);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
        if let Some(sink) = &forward {
            sink.stderr(line.as_str());
        }
        if tail.len() == STDERR_TAIL_LINE_LIMIT {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail)
}

/// Reads one line, replacing invalid UTF-8 instead of failing on it.
///
/// Returns `None` at end of stream; the trailing `\n` or `\r\n` is stripped.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Last non-empty stderr line, or the exit status when stderr was silent.
fn describe_failure<'a>(status: ExitStatus, stderr: impl DoubleEndedIterator<Item = &'a str>) -> String {
    stderr
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("interpreter {status}"))
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        LineKind, Loader, LoaderConfig, OutputLine, Session, SessionConfig, SessionStatus,
    };

    fn sh() -> ProcessConfig {
        ProcessConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            probe_args: vec!["-c".to_string(), "echo sh-probe".to_string()],
            package_probe: "test \"{package}\" = present".to_string(),
            forward_stderr: false,
        }
    }

    async fn run(runtime: &RuntimeRef, code: &str) -> (Result<(), EvalError>, Vec<OutputLine>) {
        let (sink, mut rx) = OutputSink::channel();
        let res = runtime.evaluate(code, sink, CancellationToken::new()).await;
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        (res, lines)
    }

    #[tokio::test]
    async fn test_boot_reads_probe_output() {
        let provider = ProcessProvider::new(sh());
        assert!(provider.boot().await.is_ok());
    }

    #[tokio::test]
    async fn test_boot_fails_for_missing_program() {
        let provider = ProcessProvider::new(ProcessConfig {
            program: "replvisor-no-such-interpreter".to_string(),
            ..sh()
        });
        let err = provider.boot().await.err().expect("boot must fail");
        assert_eq!(err.as_label(), "load_boot_failed");
    }

    #[tokio::test]
    async fn test_streams_stdout_in_order() {
        let runtime = ProcessProvider::new(sh()).boot().await.unwrap();
        let (res, lines) = run(&runtime, "echo a; echo b; echo c").await;
        assert_eq!(res, Ok(()));
        let texts: Vec<_> = lines.iter().map(OutputLine::as_str).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_raises_last_stderr_line() {
        let runtime = ProcessProvider::new(sh()).boot().await.unwrap();
        let (res, lines) = run(&runtime, "echo a; echo trace >&2; echo boom >&2; exit 1").await;
        assert_eq!(
            res,
            Err(EvalError::Raised {
                message: "boom".to_string()
            })
        );
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() {
        let runtime = ProcessProvider::new(sh()).boot().await.unwrap();
        let (res, _) = run(&runtime, "exit 3").await;
        match res {
            Err(EvalError::Raised { message }) => assert!(message.contains('3'), "{message}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forward_stderr_marks_lines() {
        let runtime = ProcessProvider::new(ProcessConfig {
            forward_stderr: true,
            ..sh()
        })
        .boot()
        .await
        .unwrap();
        let (res, lines) = run(&runtime, "echo warn >&2").await;
        assert_eq!(res, Ok(()));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, LineKind::Stderr);
    }

    #[tokio::test]
    async fn test_package_probe() {
        let runtime = ProcessProvider::new(sh()).boot().await.unwrap();
        assert!(runtime.load_package("present").await.is_ok());

        let err = runtime.load_package("missing").await.unwrap_err();
        assert!(matches!(err, LoadError::Package { ref package, .. } if package == "missing"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_fatal() {
        let runtime = ProcessProvider::new(ProcessConfig {
            forward_stderr: true,
            ..sh()
        })
        .boot()
        .await
        .unwrap();
        let (res, lines) = run(&runtime, "printf 'ok\\n\\377\\r\\n'; printf 'x\\376' >&2").await;
        assert_eq!(res, Ok(()));

        let texts = |kind: LineKind| {
            lines
                .iter()
                .filter(|l| l.kind == kind)
                .map(OutputLine::as_str)
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(LineKind::Stdout), ["ok", "\u{FFFD}"]);
        assert_eq!(texts(LineKind::Stderr), ["x\u{FFFD}"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_session_ready() {
        let loader = Loader::arc(ProcessProvider::arc(sh()), LoaderConfig::default());
        let session = Session::new(Arc::clone(&loader), SessionConfig::default());
        session.ensure_loaded().await.unwrap();

        session.execute("printf 'ok\\n\\377\\n'").await.unwrap();

        assert_eq!(session.status().await, SessionStatus::Ready);
        assert_eq!(session.buffer().texts().await, vec!["ok", "\u{FFFD}"]);
        assert_eq!(session.error().await, None);
        assert!(loader.handle().await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let runtime = ProcessProvider::new(sh()).boot().await.unwrap();
        let (sink, _rx) = OutputSink::channel();
        let ctx = CancellationToken::new();

        let cancel = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let res = tokio::time::timeout(
            Duration::from_secs(5),
            runtime.evaluate("sleep 30", sink, ctx),
        )
        .await
        .expect("cancellation must end the evaluation");
        assert_eq!(res, Err(EvalError::Canceled));
    }
}
