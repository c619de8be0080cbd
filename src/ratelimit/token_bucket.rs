//! Token Bucket algorithm implementation

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Token Bucket for rate limiting.
///
/// Tokens are tracked fractionally so slow refill rates do not lose partial
/// tokens between calls. Time comes from `tokio::time`, which lets tests drive
/// the bucket with a paused clock.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    /// Maximum bucket capacity
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket. Zero capacity or rate are raised to one.
    pub fn new(capacity: u32, refill_rate: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: f64::from(refill_rate.max(1)),
        }
    }

    /// Try to consume one token from the bucket.
    /// Returns true if a token was available, false otherwise.
    #[cfg(test)]
    fn try_consume(&self) -> bool {
        self.try_acquire().is_ok()
    }

    /// Take a token, or report how long until one becomes available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }

        let missing = 1.0 - state.tokens;
        Err(Duration::from_secs_f64(missing / self.refill_rate))
    }

    /// Get the current number of whole tokens available
    #[cfg(test)]
    fn available(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens.floor() as u32
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}
