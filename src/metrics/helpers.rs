//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::notification::DispatcherStatsSnapshot;

use super::{
    ACTIVE_WORKERS, DELIVERY_ATTEMPT_DURATION, NOTIFICATIONS_DELIVERED_TOTAL,
    NOTIFICATIONS_DROPPED_TOTAL, NOTIFICATIONS_RECEIVED_TOTAL, NOTIFICATIONS_RETRIED_TOTAL,
    QUEUE_DEPTH,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Why a notification left the system without being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Provider rejected it with a non-retriable status
    Rejected,
    /// Failure without a status code
    Unclassified,
    RetryBudgetExhausted,
    /// Could not be re-queued because the engine is stopping
    Shutdown,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Rejected => "rejected",
            DropReason::Unclassified => "unclassified",
            DropReason::RetryBudgetExhausted => "retry_budget_exhausted",
            DropReason::Shutdown => "shutdown",
        }
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_received() {
        NOTIFICATIONS_RECEIVED_TOTAL.inc();
    }

    pub fn record_delivered(duration: Duration) {
        NOTIFICATIONS_DELIVERED_TOTAL.inc();
        DELIVERY_ATTEMPT_DURATION.observe(duration.as_secs_f64());
    }

    /// Record a provider call that returned an error
    pub fn record_failed_attempt(duration: Duration) {
        DELIVERY_ATTEMPT_DURATION.observe(duration.as_secs_f64());
    }

    pub fn record_retry_scheduled() {
        NOTIFICATIONS_RETRIED_TOTAL.inc();
    }

    pub fn record_dropped(reason: DropReason) {
        NOTIFICATIONS_DROPPED_TOTAL
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Copy engine gauges from a stats snapshot
    pub fn update_engine_gauges(stats: &DispatcherStatsSnapshot) {
        ACTIVE_WORKERS.set(stats.active_workers as i64);
        QUEUE_DEPTH
            .with_label_values(&["primary"])
            .set(stats.primary_queue_depth as i64);
        QUEUE_DEPTH
            .with_label_values(&["retry"])
            .set(stats.retry_queue_depth as i64);
    }
}
