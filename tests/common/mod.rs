//! Common test utilities for procwatch tests

use std::path::PathBuf;
use std::time::Duration;

use procwatch::{Completion, ProcessRunner};
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Run one command on `runner` and wait for its completion
pub async fn run_and_wait(
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
        .expect("Failed to spawn");
    rx.await.expect("Completion handler dropped")
}

/// Whether a process with `pid` still exists (Linux only)
#[cfg(target_os = "linux")]
pub fn process_exists(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{}", pid)).exists()
}

/// Small deterministic generator so stress runs are reproducible
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_below(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

/// Creates a temporary directory containing a file
pub fn write_temp_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write file");
    (dir, path)
}

/// Sample batch manifest for testing
pub const SAMPLE_MANIFEST: &str = r#"
[[commands]]
name = "greet"
command = "echo"
args = ["hello"]

[[commands]]
name = "fail"
command = "sh"
args = ["-c", "echo oops >&2; exit 4"]

[[commands]]
name = "slow"
command = "sleep"
args = ["5"]
timeout_ms = 200
"#;
