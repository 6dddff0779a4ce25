//! Single-fire latch deciding how an invocation ended
//!
//! The exit-waiter and the timeout watchdog both try to fire the latch.
//! Whichever gets there first decides the outcome; the other one observes
//! the winner and backs off.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

const PENDING: u8 = 0;
const EXITED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The process exited on its own
    Exited,
    /// The watchdog fired and the process was killed
    TimedOut,
}

impl Outcome {
    fn as_raw(self) -> u8 {
        match self {
            Outcome::Exited => EXITED,
            Outcome::TimedOut => TIMED_OUT,
        }
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            EXITED => Some(Outcome::Exited),
            TIMED_OUT => Some(Outcome::TimedOut),
            _ => None,
        }
    }
}

/// Atomic latch that can be fired exactly once
#[derive(Debug, Default)]
pub struct CompletionLatch {
    state: AtomicU8,
}

impl CompletionLatch {
    /// Create an unfired latch
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
        }
    }

    /// Try to fire the latch with `outcome`.
    ///
    /// Returns `Ok(())` if this call fired it, or `Err(winner)` with the
    /// outcome that fired it first.
    pub fn try_fire(&self, outcome: Outcome) -> Result<(), Outcome> {
        match self.state.compare_exchange(
            PENDING,
            outcome.as_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => Err(Outcome::from_raw(current).unwrap_or(Outcome::TimedOut)),
        }
    }

    /// Fire the latch if still pending and return whichever outcome holds it
    pub fn resolve(&self, outcome: Outcome) -> Outcome {
        match self.try_fire(outcome) {
            Ok(()) => outcome,
            Err(winner) => winner,
        }
    }

    /// The outcome, if the latch has fired
    pub fn outcome(&self) -> Option<Outcome> {
        Outcome::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Whether the latch has fired
    pub fn is_fired(&self) -> bool {
        self.outcome().is_some()
    }
}
