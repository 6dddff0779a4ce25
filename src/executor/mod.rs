//! Process execution module
//!
//! Provides a non-blocking process runner with:
//! - Concurrent stdout/stderr capture
//! - Timeout enforcement with forced termination
//! - Exactly one completion notification per started process
//! - In-flight tracking across invocations

pub mod completion;
pub mod drain;
pub mod invocation;
pub mod latch;
pub mod runner;
pub mod watchdog;

pub use completion::{Completion, CompletionHandler, CompletionReport};
pub use invocation::{Invocation, InvocationId, ZeroTimeout};
pub use latch::{CompletionLatch, Outcome};
pub use runner::{ProcessRunner, RunnerOptions};
