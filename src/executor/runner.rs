//! Non-blocking process runner with timeout support
//!
//! `ProcessRunner::run` spawns the child and returns straight away. Per
//! invocation a supervisor task then drives:
//! - two stream readers (stdout, stderr)
//! - a timeout watchdog, unless the invocation has no deadline
//! - the exit-waiter, racing the watchdog for the completion latch
//!
//! The supervisor is the only place that finalizes, and the handler is
//! consumed when called, so each started invocation completes exactly once.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error};

use crate::config::Defaults;
use crate::error::RunError;

use super::completion::{Completion, CompletionHandler};
use super::drain::StreamDrain;
use super::invocation::{Invocation, InvocationId, ZeroTimeout};
use super::latch::{CompletionLatch, Outcome};
use super::watchdog::Watchdog;

/// Default time readers get to reach end-of-stream once the child is gone
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runner-wide behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Meaning of a zero timeout
    pub zero_timeout: ZeroTimeout,
    /// How long finalize waits for the streams to close after the child
    /// has been reaped before force-closing them
    pub drain_grace: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            zero_timeout: ZeroTimeout::default(),
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

impl RunnerOptions {
    /// Set the zero-timeout policy
    pub fn with_zero_timeout(mut self, policy: ZeroTimeout) -> Self {
        self.zero_timeout = policy;
        self
    }

    /// Set the drain grace period
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }
}

impl From<&Defaults> for RunnerOptions {
    fn from(defaults: &Defaults) -> Self {
        Self {
            zero_timeout: defaults.zero_timeout,
            drain_grace: Duration::from_millis(defaults.drain_grace_ms),
        }
    }
}

#[derive(Debug)]
struct Shared {
    handle: Handle,
    options: RunnerOptions,
    in_flight: AtomicUsize,
    next_id: AtomicU64,
    idle: Notify,
}

impl Shared {
    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Launches and supervises child processes.
///
/// Cloning is cheap; clones share the in-flight count.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shared: Arc<Shared>,
}

impl ProcessRunner {
    /// Create a runner bound to the current tokio runtime
    ///
    /// # Errors
    /// * `RunError::NoRuntime` - If called outside a tokio runtime
    pub fn new() -> Result<Self, RunError> {
        Self::with_options(RunnerOptions::default())
    }

    /// Create a runner bound to the current tokio runtime with options
    pub fn with_options(options: RunnerOptions) -> Result<Self, RunError> {
        let handle = Handle::try_current().map_err(|e| RunError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(handle, options))
    }

    /// Create a runner that spawns its tasks on `handle`.
    ///
    /// The runtime behind `handle` must have IO and time drivers enabled
    /// and should be multi-threaded if handlers block.
    pub fn with_handle(handle: Handle, options: RunnerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle,
                options,
                in_flight: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                idle: Notify::new(),
            }),
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.shared.options
    }

    /// Run `command` with `args` and report the result to `handler`.
    ///
    /// Returns once the child is spawned. A `timeout` of zero follows the
    /// runner's [`ZeroTimeout`] policy; by default it means no timeout.
    ///
    /// # Errors
    /// * `RunError::EmptyCommand` - If `command` is empty
    /// * `RunError::SpawnFailed` - If the child could not be started; the
    ///   handler is dropped without being called
    pub fn run<C, H, I, S>(
        &self,
        command: impl AsRef<std::ffi::OsStr>,
        args: I,
        timeout: Duration,
        context: C,
        handler: H,
    ) -> Result<InvocationId, RunError>
    where
        C: Send + 'static,
        H: CompletionHandler<C>,
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let invocation = Invocation::new(command).args(args).timeout(timeout);
        self.start(invocation, context, handler)
    }

    /// Start a prepared invocation. See [`ProcessRunner::run`].
    pub fn start<C, H>(
        &self,
        invocation: Invocation,
        context: C,
        handler: H,
    ) -> Result<InvocationId, RunError>
    where
        C: Send + 'static,
        H: CompletionHandler<C>,
    {
        if invocation.program().is_empty() {
            return Err(RunError::EmptyCommand);
        }

        let command_str = invocation.to_string();
        let _runtime = self.shared.handle.enter();

        let started = Instant::now();
        let mut child = Command::new(invocation.program())
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true) // Kill process if the supervisor is dropped
            .spawn()
            .map_err(|e| {
                debug!(command = %command_str, "spawn failed: {}", e);
                RunError::spawn_failed(command_str.clone(), &e)
            })?;

        let id = InvocationId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = child.id();
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);

        debug!(id = %id, pid = ?pid, command = %command_str, "process spawned");

        let streams = StreamDrain::spawn(id, child.stdout.take(), child.stderr.take());
        let deadline = self
            .shared
            .options
            .zero_timeout
            .deadline(invocation.time_budget());

        let supervisor = Supervisor {
            shared: Arc::clone(&self.shared),
            id,
            pid,
            child,
            streams,
            deadline,
            started,
            context,
            handler,
        };
        self.shared.handle.spawn(supervisor.run());

        Ok(id)
    }

    /// Whether any started invocation has not completed yet
    pub fn is_command_in_progress(&self) -> bool {
        self.in_flight() > 0
    }

    /// Number of started invocations that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no invocation is in progress
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_command_in_progress() {
                return;
            }
            notified.await;
        }
    }
}

/// Owns one running child until it has been finalized
struct Supervisor<C, H> {
    shared: Arc<Shared>,
    id: InvocationId,
    pid: Option<u32>,
    child: Child,
    streams: StreamDrain,
    deadline: Option<Duration>,
    started: Instant,
    context: C,
    handler: H,
}

impl<C, H> Supervisor<C, H>
where
    C: Send + 'static,
    H: CompletionHandler<C>,
{
    async fn run(self) {
        let Supervisor {
            shared,
            id,
            pid,
            mut child,
            streams,
            deadline,
            started,
            context,
            handler,
        } = self;

        let latch = Arc::new(CompletionLatch::new());
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let watchdog = match deadline {
            Some(deadline) => Some(Watchdog::arm(id, deadline, Arc::clone(&latch), kill_tx)),
            // Dropping the sender disables the kill branch below
            None => {
                drop(kill_tx);
                None
            }
        };

        let (status, outcome) = tokio::select! {
            status = child.wait() => (status, latch.resolve(Outcome::Exited)),
            Ok(()) = &mut kill_rx => {
                if let Err(err) = child.start_kill() {
                    debug!(id = %id, "kill failed, process already gone: {}", err);
                }
                (child.wait().await, latch.resolve(Outcome::TimedOut))
            }
        };

        if let Some(watchdog) = watchdog {
            watchdog.disarm().await;
        }

        let (stdout, stderr) = streams.collect(shared.options.drain_grace).await;

        let status = match status {
            Ok(status) => Some(status),
            Err(err) => {
                error!(id = %id, "failed waiting for process: {}", err);
                None
            }
        };

        let completion = Completion {
            id,
            pid,
            stdout,
            stderr,
            exit_code: status.and_then(|s| s.code()),
            signal: status.and_then(exit_signal),
            timed_out: outcome == Outcome::TimedOut,
            duration: started.elapsed(),
            context,
        };

        debug!(
            id = %id,
            exit_code = ?completion.exit_code,
            signal = ?completion.signal,
            timed_out = completion.timed_out,
            stdout_bytes = completion.stdout.len(),
            stderr_bytes = completion.stderr.len(),
            duration_ms = completion.duration.as_millis() as u64,
            "process finished"
        );

        shared.finish();
        handler.on_complete(completion);
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    async fn run_to_completion(
        runner: &ProcessRunner,
        command: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Completion<()> {
        let (tx, rx) = oneshot::channel();
        runner
            .run(command, args, timeout, (), move |c: Completion<()>| {
                let _ = tx.send(c);
            })
            .expect("spawn");
        rx.await.expect("completion")
    }

    #[test]
    fn test_runner_options_default() {
        let options = RunnerOptions::default();

        assert_eq!(options.zero_timeout, ZeroTimeout::Disabled);
        assert_eq!(options.drain_grace, DEFAULT_DRAIN_GRACE);
    }

    #[test]
    fn test_runner_options_builder() {
        let options = RunnerOptions::default()
            .with_zero_timeout(ZeroTimeout::Immediate)
            .with_drain_grace(Duration::from_millis(50));

        assert_eq!(options.zero_timeout, ZeroTimeout::Immediate);
        assert_eq!(options.drain_grace, Duration::from_millis(50));
    }

    #[test]
    fn test_new_outside_runtime() {
        match ProcessRunner::new() {
            Err(RunError::NoRuntime(_)) => {}
            other => panic!("Expected NoRuntime, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exit_code_reported() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(&runner, "sh", &["-c", "exit 3"], Duration::ZERO).await;

        assert_eq!(c.exit_code, Some(3));
        assert!(!c.timed_out);
        assert!(!c.success());
        assert_eq!(c.signal, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_output_captured_per_stream() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(
            &runner,
            "sh",
            &["-c", "printf 'a\\n'; printf 'b' >&2; printf 'c\\n'; printf 'd' >&2"],
            Duration::from_secs(10),
        )
        .await;

        assert!(c.success());
        assert_eq!(c.stdout, b"a\nc\n");
        assert_eq!(c.stderr, b"bd");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_arguments_are_not_shell_expanded() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(&runner, "echo", &["$HOME", "*", "a b"], Duration::ZERO).await;

        assert_eq!(c.stdout_lossy(), "$HOME * a b\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(&runner, "sleep", &["10"], Duration::from_millis(100)).await;

        assert!(c.timed_out);
        assert_eq!(c.exit_code, None);
        assert_eq!(c.signal, Some(9));
        assert!(c.duration < Duration::from_secs(5));
        assert!(!runner.is_command_in_progress());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_output_kept_on_timeout() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(
            &runner,
            "sh",
            &["-c", "echo started; exec sleep 10"],
            Duration::from_millis(300),
        )
        .await;

        assert!(c.timed_out);
        assert_eq!(c.stdout, b"started\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_zero_timeout_disabled_waits_for_exit() {
        let runner = ProcessRunner::new().unwrap();

        let c = run_to_completion(&runner, "sleep", &["0.2"], Duration::ZERO).await;

        assert!(!c.timed_out);
        assert_eq!(c.exit_code, Some(0));
        assert!(c.duration >= Duration::from_millis(200));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_zero_timeout_immediate_kills() {
        let runner = ProcessRunner::with_options(
            RunnerOptions::default().with_zero_timeout(ZeroTimeout::Immediate),
        )
        .unwrap();

        let c = run_to_completion(&runner, "sleep", &["10"], Duration::ZERO).await;

        assert!(c.timed_out);
        assert!(c.duration < Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawn_failure_never_calls_back() {
        let runner = ProcessRunner::new().unwrap();
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);

        let result = runner.run(
            "nonexistent_command_12345",
            Vec::<String>::new(),
            Duration::from_millis(50),
            (),
            move |_: Completion<()>| flag.store(true, Ordering::SeqCst),
        );

        match result {
            Err(RunError::SpawnFailed { command, kind, .. }) => {
                assert!(command.contains("nonexistent_command_12345"));
                assert_eq!(kind, std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected SpawnFailed, got {:?}", other),
        }
        assert!(!runner.is_command_in_progress());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_command_rejected() {
        let runner = ProcessRunner::new().unwrap();

        let result = runner.run("", ["x"], Duration::ZERO, (), |_: Completion<()>| {});

        assert!(matches!(result, Err(RunError::EmptyCommand)));
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_in_progress_until_callback() {
        let runner = ProcessRunner::new().unwrap();
        let (tx, rx) = oneshot::channel();
        let observer = runner.clone();

        runner
            .run("sleep", ["0.2"], Duration::ZERO, (), move |_: Completion<()>| {
                let _ = tx.send(observer.is_command_in_progress());
            })
            .unwrap();

        assert!(runner.is_command_in_progress());
        assert_eq!(runner.in_flight(), 1);

        let in_progress_inside_callback = rx.await.unwrap();
        assert!(!in_progress_inside_callback);
        assert!(!runner.is_command_in_progress());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handler_can_start_another_run() {
        let runner = ProcessRunner::new().unwrap();
        let (tx, rx) = oneshot::channel();
        let chained = runner.clone();

        runner
            .run("echo", ["first"], Duration::ZERO, 1u32, move |c: Completion<u32>| {
                assert_eq!(c.context, 1);
                chained
                    .run("echo", ["second"], Duration::ZERO, 2u32, move |c: Completion<u32>| {
                        let _ = tx.send((c.context, c.stdout));
                    })
                    .unwrap();
            })
            .unwrap();

        let (context, stdout) = rx.await.unwrap();
        assert_eq!(context, 2);
        assert_eq!(stdout, b"second\n");

        runner.wait_idle().await;
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_context_round_trips() {
        let runner = ProcessRunner::new().unwrap();
        let (tx, rx) = oneshot::channel();

        let id = runner
            .run(
                "true",
                Vec::<&str>::new(),
                Duration::ZERO,
                String::from("request-42"),
                move |c: Completion<String>| {
                    let _ = tx.send((c.id, c.context));
                },
            )
            .unwrap();

        let (completed_id, context) = rx.await.unwrap();
        assert_eq!(completed_id, id);
        assert_eq!(context, "request-42");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_grandchild_holding_pipe_is_cut_off() {
        let runner = ProcessRunner::with_options(
            RunnerOptions::default().with_drain_grace(Duration::from_millis(200)),
        )
        .unwrap();

        // The background sleep inherits stdout and outlives the shell
        let c = run_to_completion(
            &runner,
            "sh",
            &["-c", "echo parent; sleep 3 & exit 0"],
            Duration::ZERO,
        )
        .await;

        assert_eq!(c.exit_code, Some(0));
        assert_eq!(c.stdout, b"parent\n");
        assert!(c.duration < Duration::from_secs(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_idle_returns_when_nothing_runs() {
        let runner = ProcessRunner::new().unwrap();
        runner.wait_idle().await;
        assert!(!runner.is_command_in_progress());
    }
}
