//! Wall-clock source for retry scheduling.
//!
//! Retry eligibility is compared against wall-clock timestamps. Production
//! code uses `SystemClock`; tests inject a `ManualClock` and move it forward
//! explicitly instead of sleeping through backoff delays.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Time is kept as an offset from the system time at creation, so timestamps
/// stay realistic in logs and stats.
#[derive(Debug)]
pub struct ManualClock {
    base: DateTime<Utc>,
    offset_ms: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Utc::now(),
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: std::time::Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.offset_ms.fetch_add(millis, Ordering::AcqRel);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + Duration::milliseconds(self.offset_ms.load(Ordering::Acquire))
    }
}
