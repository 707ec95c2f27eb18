//! Session core: loading, status machine and execution.
//!
//! The public API from this module is [`Loader`] (process-wide single-flight
//! runtime initialization) and [`Session`] (one consumer-facing execution
//! context borrowing the loader's runtime).
//!
//! Internal modules:
//! - [`loader`]: owns the one runtime slot and deduplicates concurrent loads;
//! - [`session`]: status machine, error record and output reset per run;
//! - [`runner`]: executes one evaluation with timeout and streams its output;
//! - [`status`]: the session status enum and its transition table;
//! - [`config`]: loader and session settings;
//! - [`builder`]: wires bus, subscribers and session together.

mod builder;
mod config;
mod loader;
mod runner;
mod session;
mod status;

pub use builder::SessionBuilder;
pub use config::{LoaderConfig, SessionConfig};
pub use loader::{Loader, same_runtime};
pub use session::Session;
pub use status::SessionStatus;
