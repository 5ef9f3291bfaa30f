//! Join retry policies.
//!
//! The provisioner asks the policy two things: how long a provisioning
//! window may stay open, and how long to wait after the n-th failure
//! (or whether to give up).
//!
//! Backoff of [`BoundedRetry`]: 2 s → 4 s → 8 s … capped at 60 s.

use crate::config::RetryConfig;

pub trait RetryPolicy {
    /// Length of one provisioning window, `None` to wait indefinitely.
    fn window_ms(&self) -> Option<u32>;

    /// Delay before the next attempt after `failures` failed ones
    /// (`failures >= 1`), or `None` to give up.
    fn next_delay_ms(&mut self, failures: u32) -> Option<u32>;
}

/// Exponential backoff with an optional attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRetry {
    max_attempts: u32,
    window_ms: u32,
    initial_backoff_ms: u32,
    max_backoff_ms: u32,
}

impl BoundedRetry {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            window_ms: cfg.provisioning_window_ms,
            initial_backoff_ms: cfg.initial_backoff_ms,
            max_backoff_ms: cfg.max_backoff_ms,
        }
    }
}

impl RetryPolicy for BoundedRetry {
    fn window_ms(&self) -> Option<u32> {
        Some(self.window_ms)
    }

    fn next_delay_ms(&mut self, failures: u32) -> Option<u32> {
        if self.max_attempts != 0 && failures >= self.max_attempts {
            return None;
        }
        let shift = failures.saturating_sub(1).min(31);
        let delay = self
            .initial_backoff_ms
            .checked_shl(shift)
            .filter(|d| d >> shift == self.initial_backoff_ms)
            .unwrap_or(u32::MAX);
        Some(delay.min(self.max_backoff_ms))
    }
}

/// Keep the provisioning window open until someone submits working
/// credentials. Matches the behaviour of boards that block in
/// provisioning forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryForever;

impl RetryPolicy for RetryForever {
    fn window_ms(&self) -> Option<u32> {
        None
    }

    fn next_delay_ms(&mut self, _failures: u32) -> Option<u32> {
        Some(0)
    }
}
