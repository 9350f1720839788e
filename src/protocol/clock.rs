//! Clock collaborator
//!
//! The protocol stamps `created_at` (and the predecessor's `valid_until`)
//! from a `Clock`. Within one process a clock never hands out the same
//! instant twice and never goes backwards.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, forced strictly increasing.
///
/// If the wall clock stalls or steps back, the clock hands out the last
/// instant plus one microsecond instead.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose first reading is strictly after `floor`.
    ///
    /// Used when reopening a durable store whose newest snapshot may be
    /// ahead of this machine's wall clock.
    pub fn resuming_after(floor: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(Some(floor)),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let wall = Utc::now();
        let next = match *last {
            Some(prev) if wall <= prev => prev + Duration::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

/// Deterministic clock for tests: every reading advances by a fixed step.
#[derive(Debug)]
pub struct ManualClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, Duration::seconds(1))
    }

    pub fn with_step(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Move the next reading to `at`, even backwards.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.next.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let at = *next;
        *next = at + self.step;
        at
    }
}
