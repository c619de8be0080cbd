//! Notification entity and the dispatch engine.
//!
//! A notification moves through these states:
//!
//! ```text
//! Ingested -> Delivering -> Delivered
//!                        -> RetryScheduled -> Delivering   (at most MAX_RETRIES times)
//!                        -> Discarded
//! ```
//!
//! Accepted notifications go to the primary queue. Workers take them from
//! there, wait for a rate limiter token and call the delivery provider.
//! Throttling (429) and server errors (5xx) send the notification to the retry
//! queue with an exponential backoff; every other failure is logged and the
//! notification is dropped. There is no dead-letter storage.

mod dispatcher;
mod types;
mod worker;

pub use dispatcher::{
    DispatcherConfig, DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher,
};
pub use types::{Notification, NotificationMetadata, RetryBudgetExceeded, MAX_RETRIES};
