//! Exponential backoff for `parallel_start`'s per-task retry. The legacy
//! source retries without backoff; this is the deliberate improvement the
//! specification's Design Notes call out (open question, resolved in
//! DESIGN.md): add exponential backoff with a cap so a flaky provider isn't
//! hammered by every sibling task at once.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_factor: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 200,
            backoff_factor: 2.0,
            max_backoff_ms: 30_000,
        }
    }

    pub fn exponential(max_retries: u32, initial_backoff_ms: u64, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: initial_backoff_ms.max(1),
            backoff_factor: if backoff_factor <= 0.0 { 2.0 } else { backoff_factor },
            ..Self::none()
        }
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms.max(1);
        self
    }

    pub fn can_retry(&self, attempts_done: u32) -> bool {
        attempts_done < self.max_retries
    }

    pub fn backoff_duration(&self, attempts_done: u32) -> Duration {
        if self.max_retries == 0 {
            return Duration::ZERO;
        }
        let exp = self.backoff_factor.powi(attempts_done as i32);
        let base = (self.initial_backoff_ms as f64 * exp).round() as u64;
        Duration::from_millis(base.min(self.max_backoff_ms.max(1)))
    }
}
