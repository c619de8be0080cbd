//! Blocking rate limiter shared by the dispatch workers

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::token_bucket::TokenBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("rate limiter wait cancelled")]
    Cancelled,
}

/// Gate in front of the delivery provider.
///
/// `acquire` parks the caller until a token is free. The bucket is the only
/// state shared between workers and is synchronised internally.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
    rate: u32,
    burst: u32,
}

impl RateLimiter {
    /// Allow `rate` calls per second on average with bursts up to `burst`
    pub fn new(rate: u32, burst: u32) -> Self {
        Self {
            bucket: TokenBucket::new(burst, rate),
            rate,
            burst,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Wait for a token. Fails with `Cancelled` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            let wait = match self.bucket.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            tracing::trace!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");

            tokio::select! {
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_paced() {
        // 5 tokens/sec, burst 10: 20 calls need 10 immediate + 10 paced at 200ms
        let limiter = RateLimiter::new(5, 10);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut grants = Vec::new();

        for _ in 0..20 {
            limiter.acquire(&cancel).await.unwrap();
            grants.push(start.elapsed());
        }

        let immediate = grants.iter().filter(|d| d.is_zero()).count();
        assert_eq!(immediate, 10);

        for pair in grants[10..].windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(190));
        }
        assert!(start.elapsed() >= Duration::from_millis(1990));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquire_is_bounded() {
        let limiter = Arc::new(RateLimiter::new(5, 10));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    limiter.acquire(&cancel).await.unwrap();
                    start.elapsed()
                })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }

        let within_first_second = grants.iter().filter(|d| **d < Duration::from_secs(1)).count();
        assert!(within_first_second <= 15, "granted {within_first_second} in first second");
        assert!(grants.iter().filter(|d| d.is_zero()).count() <= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_cancelled() {
        let limiter = RateLimiter::new(1, 1);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let cancel = cancel.clone();
            async move { limiter.acquire(&cancel).await }
        };
        let handle = tokio::spawn(waiter);

        tokio::time::advance(Duration::from_millis(100)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), Err(RateLimitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_succeeds_with_available_token_after_cancel() {
        let limiter = RateLimiter::new(5, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Tokens on hand are still granted; only waiting observes cancellation
        assert!(limiter.acquire(&cancel).await.is_ok());
        assert!(limiter.acquire(&cancel).await.is_ok());
        assert_eq!(limiter.acquire(&cancel).await, Err(RateLimitError::Cancelled));
    }
}
