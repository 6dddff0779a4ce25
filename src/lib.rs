//! procwatch - Asynchronous External Process Runner
//!
//! Launches child processes without blocking the caller, captures their
//! stdout and stderr, enforces timeouts and reports each run exactly once.
//!
//! ## Features
//!
//! - Non-blocking `run` returning as soon as the child is spawned
//! - Concurrent stdout/stderr draining, byte-exact
//! - Timeout watchdog that kills overdue processes
//! - Exactly one completion per started process, even when exit and
//!   timeout race
//! - In-flight tracking across concurrent invocations
//! - XDG-compliant layered configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use procwatch::{Completion, ProcessRunner};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), procwatch::RunError> {
//! let runner = ProcessRunner::new()?;
//! let (tx, rx) = tokio::sync::oneshot::channel();
//!
//! let context = String::from("greeting");
//! runner.run("echo", ["hello"], Duration::from_secs(5), context, move |c: Completion<String>| {
//!     let _ = tx.send(c);
//! })?;
//!
//! let completion = rx.await.unwrap();
//! assert_eq!(completion.context, "greeting");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ErrorInfo, RunError};
pub use executor::{
    Completion, CompletionHandler, CompletionReport, Invocation, InvocationId, Outcome,
    ProcessRunner, RunnerOptions, ZeroTimeout,
};
