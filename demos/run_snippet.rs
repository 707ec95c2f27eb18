//! # Example: run_snippet
//!
//! Boots a local Python interpreter as the shared runtime, opens two sessions
//! over it and runs a snippet in each.
//!
//! Demonstrates how to:
//! - Configure a [`ProcessProvider`] and a process-wide [`Loader`].
//! - Build sessions with the built-in [`LogWriter`] subscriber.
//! - Read the captured transcript and the error record after a run.
//!
//! ## Flow
//! ```text
//! Loader::global(ProcessProvider) ──► Session "first" ─┐
//!                                 └─► Session "second" ┴─► ensure_loaded() (one boot)
//!     first.execute(code)   ──► transcript printed
//!     second.execute(raise) ──► "Error: ..." line, status back to ready
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example run_snippet --features logging -- "print(1 + 1)"
//! ```

use std::sync::Arc;
use std::time::Duration;

use replvisor::{
    Loader, LoaderConfig, LogWriter, ProcessConfig, ProcessProvider, Session, SessionConfig,
    Subscribe,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let code = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "for i in range(3):\n    print('tick', i)".to_string());

    // 1. One loader for the whole process
    let loader = Loader::global(|| {
        Loader::new(
            ProcessProvider::arc(ProcessConfig::default()),
            LoaderConfig {
                timeout: Duration::from_secs(30),
                ..LoaderConfig::default()
            }
            .with_package("json"),
        )
    });

    // 2. Two sessions sharing it
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let first = Session::builder(Arc::clone(&loader))
        .with_config(SessionConfig {
            name: "first".into(),
            timeout: Duration::from_secs(10),
            ..SessionConfig::default()
        })
        .with_subscribers(subs.clone())
        .build();
    let second = Session::builder(loader)
        .with_config(SessionConfig {
            name: "second".into(),
            ..SessionConfig::default()
        })
        .with_subscribers(subs)
        .build();

    // 3. Both trigger the load; the runtime boots once
    let (a, b) = tokio::join!(first.ensure_loaded(), second.ensure_loaded());
    a?;
    b?;

    // 4. Run and print the transcripts
    first.execute(&code).await?;
    println!("--- first ({}) ---", first.status().await);
    for line in first.output().await {
        println!("{line}");
    }

    second.execute("raise ValueError('bad input')").await?;
    println!("--- second ({}) ---", second.status().await);
    for line in second.output().await {
        println!("{line}");
    }
    if let Some(err) = second.error().await {
        println!("error record: {err}");
    }

    // Give the subscriber workers a moment to flush their logs.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
