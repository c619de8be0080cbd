//! Prometheus metrics for the relay.
//!
//! - Ingestion and delivery outcome counters
//! - Provider call latency
//! - Worker and queue gauges, refreshed on scrape

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, DropReason};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "hook_relay";

lazy_static! {
    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Notifications accepted on the ingestion endpoint
    pub static ref NOTIFICATIONS_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_received_total", METRIC_PREFIX),
        "Total notifications accepted into the primary queue"
    ).unwrap();

    /// Notifications the provider accepted
    pub static ref NOTIFICATIONS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_delivered_total", METRIC_PREFIX),
        "Total notifications delivered to the provider"
    ).unwrap();

    /// Notifications scheduled for another attempt
    pub static ref NOTIFICATIONS_RETRIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_retried_total", METRIC_PREFIX),
        "Total notifications placed on the retry queue"
    ).unwrap();

    /// Notifications given up on, by reason
    pub static ref NOTIFICATIONS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_dropped_total", METRIC_PREFIX),
        "Total notifications discarded without delivery",
        &["reason"]
    ).unwrap();

    /// Duration of provider calls
    pub static ref DELIVERY_ATTEMPT_DURATION: Histogram = register_histogram!(
        format!("{}_delivery_attempt_duration_seconds", METRIC_PREFIX),
        "Duration of delivery calls to the provider in seconds",
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // ============================================================================
    // Engine Metrics
    // ============================================================================

    /// Running delivery workers
    pub static ref ACTIVE_WORKERS: IntGauge = register_int_gauge!(
        format!("{}_active_workers", METRIC_PREFIX),
        "Number of running delivery workers"
    ).unwrap();

    /// Buffered notifications per queue
    pub static ref QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Notifications currently buffered",
        &["queue"]
    ).unwrap();
}
