//! Outbound rate limiting using the Token Bucket algorithm.
//!
//! Every call to the delivery provider takes one token. The bucket refills at a
//! steady rate and holds at most `burst` tokens, so short spikes are absorbed
//! up to the burst size and sustained load is paced to the configured rate.

mod limiter;
mod token_bucket;

pub use limiter::{RateLimitError, RateLimiter};
pub use token_bucket::TokenBucket;
