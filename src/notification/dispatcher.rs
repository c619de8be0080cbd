use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::clock::{Clock, SystemClock};
use crate::delivery::DeliveryClient;
use crate::metrics::DeliveryMetrics;
use crate::queue::{NotificationQueue, QueueClosed};
use crate::ratelimit::RateLimiter;

use super::worker::Worker;
use super::Notification;

/// Sizing of the dispatch engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of delivery workers
    pub worker_count: usize,
    /// Capacity of each of the primary and retry queues
    pub queue_capacity: usize,
    /// Provider calls per second
    pub rate_limit: u32,
    /// Provider calls allowed in a burst
    pub burst_limit: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            queue_capacity: 100,
            rate_limit: 5,
            burst_limit: 10,
        }
    }
}

/// Counters shared by the workers
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Workers currently inside their loop
    pub active_workers: AtomicUsize,
    /// Notifications taken from the primary queue; wraps to zero at `u64::MAX`
    pub messages_processed: AtomicU64,
    /// Unix milliseconds of the last primary-queue pickup, zero if none yet
    pub last_processed_at: AtomicI64,
}

impl DispatcherStats {
    pub(crate) fn record_processed(&self, now: DateTime<Utc>) {
        let previous = self
            .messages_processed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                Some(count.checked_add(1).unwrap_or(0))
            });

        if previous == Ok(u64::MAX) {
            tracing::info!("Resetting messages_processed counter to zero, reached u64::MAX");
        }

        self.last_processed_at
            .store(now.timestamp_millis(), Ordering::Relaxed);
    }

    fn last_processed(&self) -> Option<DateTime<Utc>> {
        match self.last_processed_at.load(Ordering::Relaxed) {
            0 => None,
            millis => Utc.timestamp_millis_opt(millis).single(),
        }
    }
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub active_workers: usize,
    pub primary_queue_depth: usize,
    pub retry_queue_depth: usize,
    pub messages_processed: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Relays queued notifications to the delivery provider.
///
/// Owns the primary and retry queues, the outbound rate limiter and a fixed
/// pool of workers. Producers call `enqueue`; workers drain both queues until
/// `stop` is called.
pub struct NotificationDispatcher {
    pub(super) primary: NotificationQueue,
    pub(super) retry: NotificationQueue,
    pub(super) client: Arc<dyn DeliveryClient>,
    pub(super) rate_limiter: RateLimiter,
    pub(super) stats: DispatcherStats,
    pub(super) shutdown: CancellationToken,
    pub(super) clock: Arc<dyn Clock>,
    workers: TaskTracker,
    started: AtomicBool,
}

impl NotificationDispatcher {
    pub fn new(config: DispatcherConfig, client: Arc<dyn DeliveryClient>) -> Self {
        Self::with_clock(config, client, Arc::new(SystemClock))
    }

    /// Create a dispatcher that schedules retries against `clock`
    pub fn with_clock(
        config: DispatcherConfig,
        client: Arc<dyn DeliveryClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            primary: NotificationQueue::new("primary", config.queue_capacity),
            retry: NotificationQueue::new("retry", config.queue_capacity),
            rate_limiter: RateLimiter::new(config.rate_limit, config.burst_limit),
            client,
            stats: DispatcherStats::default(),
            shutdown: CancellationToken::new(),
            clock,
            workers: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Add a notification to the primary queue.
    ///
    /// Waits while the queue is full. Fails once the dispatcher is stopping.
    pub async fn enqueue(&self, notification: Notification) -> Result<(), QueueClosed> {
        let id = notification.id.clone();
        self.primary.push(notification).await?;

        DeliveryMetrics::record_received();
        tracing::debug!(
            notification_id = %id,
            queue_depth = self.primary.len(),
            queue_capacity = self.primary.capacity(),
            "Notification queued for delivery"
        );
        Ok(())
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            active_workers: self.stats.active_workers.load(Ordering::Relaxed),
            primary_queue_depth: self.primary.len(),
            retry_queue_depth: self.retry.len(),
            messages_processed: self.stats.messages_processed.load(Ordering::Relaxed),
            last_processed_at: self.stats.last_processed(),
        }
    }

    /// Launch `worker_count` workers. Only the first call has an effect.
    pub fn start(self: &Arc<Self>, worker_count: usize) {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("Dispatcher already started, ignoring start request");
            return;
        }

        tracing::info!(
            worker_count,
            rate_limit = self.rate_limiter.rate(),
            burst_limit = self.rate_limiter.burst(),
            queue_capacity = self.primary.capacity(),
            "Starting workers"
        );
        for worker_id in 0..worker_count {
            self.stats.active_workers.fetch_add(1, Ordering::Relaxed);
            let worker = Worker::new(worker_id, Arc::clone(self));
            self.workers.spawn(worker.run());
        }
        tracing::info!(worker_count, "All workers started");
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Both queues are sealed before cancellation is signalled, so a worker may
    /// still pick up an item that was already buffered. Draining is best
    /// effort: anything left in the queues afterwards is discarded.
    pub async fn stop(&self) {
        tracing::info!("Stopping workers");
        self.primary.close();
        self.retry.close();
        tracing::debug!("Queues closed, cancelling workers");

        self.shutdown.cancel();
        self.workers.close();
        self.workers.wait().await;

        let remaining_primary = self.primary.len();
        let remaining_retry = self.retry.len();
        if remaining_primary + remaining_retry > 0 {
            tracing::warn!(
                remaining_primary,
                remaining_retry,
                "Workers stopped with undelivered notifications"
            );
        }
        tracing::info!("All workers finished");
    }

    /// True until `stop` has been called
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}
