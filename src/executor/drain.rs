//! Stream drain readers for a child's stdout and stderr
//!
//! Each stream gets its own task that owns its buffer until finalize joins
//! it. Readers stop at end-of-stream, on a read error, or when finalize
//! force-closes them because something outside the child (a grandchild, for
//! instance) is still holding the pipe open after the child is gone.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace, warn};

use super::invocation::InvocationId;

/// Read chunk size
const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// The pair of reader tasks for one invocation
#[derive(Debug)]
pub struct StreamDrain {
    id: InvocationId,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
    close_tx: watch::Sender<bool>,
}

impl StreamDrain {
    /// Start draining both streams. Must be called from within a runtime.
    pub fn spawn<O, E>(id: InvocationId, stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (close_tx, close_rx) = watch::channel(false);

        let stdout = tokio::spawn(drain(id, StreamKind::Stdout, stdout, close_rx.clone()));
        let stderr = tokio::spawn(drain(id, StreamKind::Stderr, stderr, close_rx));

        Self {
            id,
            stdout,
            stderr,
            close_tx,
        }
    }

    /// Wait for both readers and hand over their buffers.
    ///
    /// Readers get `grace` to reach end-of-stream on their own. After that
    /// they are told to close and return what they have.
    pub async fn collect(self, grace: Duration) -> (Vec<u8>, Vec<u8>) {
        let StreamDrain {
            id,
            stdout,
            stderr,
            close_tx,
        } = self;

        let mut readers = Box::pin(async move { tokio::join!(stdout, stderr) });

        let (stdout, stderr) = match tokio::time::timeout(grace, &mut readers).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!(
                    id = %id,
                    grace_ms = grace.as_millis() as u64,
                    "streams still open after child is gone, closing"
                );
                let _ = close_tx.send(true);
                readers.await
            }
        };

        (
            joined_output(id, StreamKind::Stdout, stdout),
            joined_output(id, StreamKind::Stderr, stderr),
        )
    }
}

fn joined_output(id: InvocationId, stream: StreamKind, res: Result<Vec<u8>, JoinError>) -> Vec<u8> {
    res.unwrap_or_else(|err| {
        warn!(id = %id, stream = %stream, "reader task failed: {}", err);
        Vec::new()
    })
}

/// Read `reader` to exhaustion, or until `close` changes.
///
/// Read errors end the stream; bytes read before the error are kept.
pub async fn drain<R>(
    id: InvocationId,
    stream: StreamKind,
    reader: Option<R>,
    mut close: watch::Receiver<bool>,
) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Vec::new();
    };

    let mut output = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        tokio::select! {
            biased;
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    trace!(id = %id, stream = %stream, bytes = output.len(), "end of stream");
                    break;
                }
                Ok(n) => output.extend_from_slice(&chunk[..n]),
                Err(err) => {
                    warn!(id = %id, stream = %stream, "Error reading output: {}", err);
                    break;
                }
            },
            _ = close.changed() => {
                debug!(id = %id, stream = %stream, bytes = output.len(), "stream force-closed");
                break;
            }
        }
    }

    output
}
