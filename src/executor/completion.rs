//! Completion record and the handler that receives it

use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;

use super::invocation::InvocationId;

/// Everything known about an invocation once it has finished
#[derive(Debug, Clone)]
pub struct Completion<C> {
    /// Identifier returned when the invocation was started
    pub id: InvocationId,
    /// OS process id of the child
    pub pid: Option<u32>,
    /// Bytes the child wrote to stdout
    pub stdout: Vec<u8>,
    /// Bytes the child wrote to stderr
    pub stderr: Vec<u8>,
    /// Exit code, `None` if the child was terminated by a signal
    pub exit_code: Option<i32>,
    /// Terminating signal (Unix only)
    pub signal: Option<i32>,
    /// Whether the child was killed for exceeding its timeout
    pub timed_out: bool,
    /// Wall-clock time from spawn to finalize
    pub duration: Duration,
    /// Caller context passed to `run`, returned unchanged
    pub context: C,
}

impl<C> Completion<C> {
    /// Exited on its own with code 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Receives the completion of one invocation.
///
/// `on_complete` takes the handler by value, so it can be called at most once.
/// It runs on a runtime worker after the in-flight count has been updated and
/// may start further invocations on the same runner. Long blocking work should
/// be moved elsewhere.
pub trait CompletionHandler<C>: Send + 'static {
    fn on_complete(self, completion: Completion<C>);
}

impl<C, F> CompletionHandler<C> for F
where
    F: FnOnce(Completion<C>) + Send + 'static,
{
    fn on_complete(self, completion: Completion<C>) {
        self(completion)
    }
}

/// Serializable view of a completion for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub name: String,
    pub id: InvocationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub success: bool,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

impl CompletionReport {
    pub fn new<C>(name: impl Into<String>, completion: &Completion<C>) -> Self {
        Self {
            name: name.into(),
            id: completion.id,
            pid: completion.pid,
            success: completion.success(),
            exit_code: completion.exit_code,
            signal: completion.signal,
            timed_out: completion.timed_out,
            duration_ms: completion.duration.as_millis() as u64,
            stdout: completion.stdout_lossy().into_owned(),
            stderr: completion.stderr_lossy().into_owned(),
        }
    }
}
