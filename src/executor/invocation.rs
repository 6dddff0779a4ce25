//! Description of a single command to run

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier handed out for every started invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InvocationId(pub(crate) u64);

impl InvocationId {
    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a timeout of zero means
///
/// A zero timeout is ambiguous, so the runner never guesses: it applies
/// whichever policy it was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroTimeout {
    /// Zero disables the timeout; only natural exit ends the run
    #[default]
    Disabled,
    /// Zero expires immediately; the process is killed right after spawn
    Immediate,
}

impl ZeroTimeout {
    /// Resolve a requested timeout into the watchdog deadline, if any
    pub fn deadline(self, timeout: Duration) -> Option<Duration> {
        if !timeout.is_zero() {
            return Some(timeout);
        }
        match self {
            ZeroTimeout::Disabled => None,
            ZeroTimeout::Immediate => Some(Duration::ZERO),
        }
    }
}

/// A command, its arguments and its time budget.
///
/// Arguments are passed to the program verbatim; no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    timeout: Duration,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments and no timeout
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            timeout: Duration::ZERO,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn time_budget(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("sh")
            .arg("-c")
            .args(["echo $0", "first"])
            .timeout_ms(1500);

        assert_eq!(inv.program(), OsStr::new("sh"));
        assert_eq!(inv.arguments().len(), 3);
        assert_eq!(inv.time_budget(), Duration::from_millis(1500));
        assert_eq!(inv.to_string(), "sh -c echo $0 first");
    }

    #[test]
    fn test_invocation_defaults_to_no_timeout() {
        let inv = Invocation::new("true");
        assert!(inv.time_budget().is_zero());
        assert!(inv.arguments().is_empty());
    }

    #[test]
    fn test_zero_timeout_disabled() {
        assert_eq!(ZeroTimeout::Disabled.deadline(Duration::ZERO), None);
        assert_eq!(
            ZeroTimeout::Disabled.deadline(Duration::from_secs(2)),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_zero_timeout_immediate() {
        assert_eq!(
            ZeroTimeout::Immediate.deadline(Duration::ZERO),
            Some(Duration::ZERO)
        );
        assert_eq!(
            ZeroTimeout::Immediate.deadline(Duration::from_millis(10)),
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_zero_timeout_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ZeroTimeout,
        }

        let w: Wrapper = toml::from_str("policy = \"immediate\"").unwrap();
        assert_eq!(w.policy, ZeroTimeout::Immediate);
    }

    #[test]
    fn test_invocation_id_display() {
        assert_eq!(InvocationId(7).to_string(), "#7");
        assert_eq!(InvocationId(7).as_u64(), 7);
    }
}
