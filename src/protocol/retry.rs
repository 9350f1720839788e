//! Conflict retry policy
//!
//! A mutation that loses the retire race backs off and starts over from a
//! fresh read. Backoff is exponential with random jitter so that losers of
//! one race do not collide again in lockstep.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// What edit, attach and delete do when the current snapshot is a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstonePolicy {
    /// Edit and attach succeed and bring the entity back to life.
    #[default]
    AllowUndelete,
    /// Edit and attach fail with `Deleted`; only `restore` revives.
    RequireRestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    /// Retry immediately; for tests and single-writer tools.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Uniform in `[cap / 2, cap]`, where `cap = base * 2^(attempt - 1)`
    /// clamped to `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let cap = self
            .base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff);
        let half = cap / 2;
        let spread = (cap - half).as_micros() as u64;
        if spread == 0 {
            return cap;
        }
        half + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(1),
            Duration::from_millis(50),
        )
    }
}
