// src/deadline.rs

//! Single-deadline budget for one publish invocation
//!
//! One [`Deadline`] is established at orchestration start and threaded
//! through every remote call and every poll loop. Stages check it before
//! doing work and sleep through it between poll attempts, so expiry is
//! observed promptly instead of being discovered after a long transfer.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// A point in time after which the pipeline must stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    /// Deadline `timeout` from now, shortened by a safety margin so the
    /// caller keeps a little budget for its own finalization.
    ///
    /// A margin at or above the timeout collapses to a zero budget rather
    /// than panicking on underflow.
    pub fn with_margin(timeout: Duration, margin: Duration) -> Self {
        Self::from_timeout(timeout.saturating_sub(margin))
    }

    /// Time left before expiry, or `DeadlineExceeded` if already past it.
    pub fn remaining(&self) -> Result<Duration> {
        let now = Instant::now();
        if now >= self.expires_at {
            Err(Error::DeadlineExceeded {
                overrun_ms: (now - self.expires_at).as_millis() as u64,
            })
        } else {
            Ok(self.expires_at - now)
        }
    }

    /// Fail fast if the deadline has passed.
    pub fn check(&self) -> Result<()> {
        self.remaining().map(|_| ())
    }

    /// Sleep for `duration`, clamped to the remaining budget.
    ///
    /// Fails immediately if the deadline has already passed. A sleep that
    /// was clamped still returns `Ok`; the caller's next `check` observes
    /// the expiry.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let remaining = self.remaining()?;
        std::thread::sleep(duration.min(remaining));
        Ok(())
    }
}
