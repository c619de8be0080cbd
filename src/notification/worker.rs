//! Delivery worker loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::delivery::{DeliveryError, DeliveryRequest};
use crate::metrics::{DeliveryMetrics, DropReason};

use super::dispatcher::{DispatcherStats, NotificationDispatcher};
use super::Notification;

/// Decrements the active worker count when the worker exits, including on panic.
struct ActiveWorkerGuard<'a>(&'a DispatcherStats);

impl Drop for ActiveWorkerGuard<'_> {
    fn drop(&mut self) {
        self.0.active_workers.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) struct Worker {
    id: usize,
    dispatcher: Arc<NotificationDispatcher>,
}

impl Worker {
    pub(super) fn new(id: usize, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { id, dispatcher }
    }

    /// Pull from both queues until shutdown is signalled.
    ///
    /// `select!` polls its branches in random order, so neither queue has
    /// priority over the other.
    pub(super) async fn run(self) {
        let dispatcher = &self.dispatcher;
        let _active = ActiveWorkerGuard(&dispatcher.stats);
        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            tokio::select! {
                _ = dispatcher.shutdown.cancelled() => {
                    tracing::info!(worker_id = self.id, "Shutdown signalled, worker exiting");
                    break;
                }
                Some(notification) = dispatcher.primary.pop() => {
                    dispatcher.stats.record_processed(dispatcher.clock.now());
                    self.send_notification(notification).await;
                }
                Some(notification) = dispatcher.retry.pop() => {
                    self.handle_retry(notification).await;
                }
            }
        }
    }

    async fn handle_retry(&self, mut notification: Notification) {
        if !notification.ready_to_retry(self.dispatcher.clock.now()) {
            // Not eligible yet: put it back as-is. This spins on the item until
            // its backoff has elapsed, so yield to keep other tasks running.
            self.requeue(notification).await;
            tokio::task::yield_now().await;
            return;
        }

        match notification.increment_retry_count() {
            Ok(retry_count) => {
                tracing::debug!(
                    worker_id = self.id,
                    notification_id = %notification.id,
                    retry_count,
                    "Retrying notification"
                );
                self.send_notification(notification).await;
            }
            Err(e) => {
                tracing::warn!(
                    worker_id = self.id,
                    notification_id = %notification.id,
                    error = %e,
                    reason = DropReason::RetryBudgetExhausted.as_str(),
                    "Retry count exceeded, dropping notification"
                );
                DeliveryMetrics::record_dropped(DropReason::RetryBudgetExhausted);
            }
        }
    }

    /// Make one rate-limited delivery attempt.
    async fn send_notification(&self, notification: Notification) {
        let dispatcher = &self.dispatcher;

        if let Err(e) = dispatcher.rate_limiter.acquire(&dispatcher.shutdown).await {
            tracing::warn!(
                worker_id = self.id,
                notification_id = %notification.id,
                error = %e,
                "Gave up waiting for rate limiter"
            );
            DeliveryMetrics::record_dropped(DropReason::Shutdown);
            return;
        }

        let request = DeliveryRequest {
            event_type: &notification.event_type,
            event_id: &notification.id,
            payload: &notification.data,
            idempotency_key: &notification.id,
            attempt: notification.retry_count(),
        };

        let started = Instant::now();
        let result = dispatcher.client.deliver(request).await;
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                DeliveryMetrics::record_delivered(elapsed);
                tracing::info!(
                    worker_id = self.id,
                    notification = %notification,
                    duration_ms = elapsed.as_millis() as u64,
                    "Notification delivered"
                );
            }
            Err(e) => {
                DeliveryMetrics::record_failed_attempt(elapsed);
                self.handle_failure(notification, e).await;
            }
        }
    }

    /// Schedule a retry for throttling and server errors while budget remains,
    /// drop everything else.
    async fn handle_failure(&self, mut notification: Notification, error: DeliveryError) {
        if error.is_retriable() && notification.can_retry() {
            notification.set_retry_time(self.dispatcher.clock.now());
            let id = notification.id.clone();
            let retry_count = notification.retry_count();
            let next_retry_at = notification.metadata.next_retry_at;

            if self.requeue(notification).await {
                DeliveryMetrics::record_retry_scheduled();
                tracing::info!(
                    worker_id = self.id,
                    notification_id = %id,
                    retry_count,
                    next_retry_at = ?next_retry_at,
                    status = ?error.status(),
                    "Delivery failed, retry scheduled"
                );
            }
            return;
        }

        let reason = if error.is_retriable() {
            DropReason::RetryBudgetExhausted
        } else if error.status().is_some() {
            DropReason::Rejected
        } else {
            DropReason::Unclassified
        };

        tracing::warn!(
            worker_id = self.id,
            notification = %notification,
            status = ?error.status(),
            kind = error.kind(),
            error = %error,
            reason = reason.as_str(),
            "Error sending notification, dropping"
        );
        DeliveryMetrics::record_dropped(reason);
    }

    /// Push onto the retry queue, giving up if the dispatcher shuts down first.
    async fn requeue(&self, notification: Notification) -> bool {
        let dispatcher = &self.dispatcher;
        let id = notification.id.clone();

        tokio::select! {
            result = dispatcher.retry.push(notification) => match result {
                Ok(()) => true,
                Err(closed) => {
                    tracing::warn!(
                        worker_id = self.id,
                        notification = %closed.notification,
                        reason = DropReason::Shutdown.as_str(),
                        "Retry queue closed, dropping notification"
                    );
                    DeliveryMetrics::record_dropped(DropReason::Shutdown);
                    false
                }
            },
            _ = dispatcher.shutdown.cancelled() => {
                tracing::warn!(
                    worker_id = self.id,
                    notification_id = %id,
                    reason = DropReason::Shutdown.as_str(),
                    "Shutdown while re-queueing, dropping notification"
                );
                DeliveryMetrics::record_dropped(DropReason::Shutdown);
                false
            }
        }
    }
}
