//! Timeout watchdog
//!
//! Sleeps until the deadline unless it is disarmed first. On expiry it fires
//! the completion latch as timed-out and asks the supervisor to kill the
//! child. It never touches the child itself; the supervisor owns it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::invocation::InvocationId;
use super::latch::{CompletionLatch, Outcome};

#[derive(Debug)]
pub struct Watchdog {
    cancel_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Start the timer. `kill_tx` is signalled only if this watchdog wins
    /// the latch. Must be called from within a runtime.
    pub fn arm(
        id: InvocationId,
        deadline: Duration,
        latch: Arc<CompletionLatch>,
        kill_tx: oneshot::Sender<()>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    match latch.try_fire(Outcome::TimedOut) {
                        Ok(()) => {
                            warn!(
                                id = %id,
                                timeout_ms = deadline.as_millis() as u64,
                                "timeout elapsed, killing process"
                            );
                            let _ = kill_tx.send(());
                        }
                        Err(winner) => {
                            debug!(id = %id, ?winner, "timeout elapsed after completion was decided");
                        }
                    }
                }
                _ = cancel_rx => {
                    trace!(id = %id, "watchdog disarmed");
                }
            }
        });

        Self {
            cancel_tx: Some(cancel_tx),
            handle,
        }
    }

    /// Stop the timer and wait for the watchdog task to finish
    pub async fn disarm(mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            warn!("watchdog task failed: {}", err);
        }
    }
}
