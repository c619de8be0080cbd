//! Graceful shutdown handling for the relay.
//!
//! The binary stops accepting HTTP requests first, then runs
//! [`GracefulShutdown::execute`], which:
//! 1. Seals both dispatch queues so no new work is accepted
//! 2. Signals the workers to stop and waits for them, bounded by `drain_timeout`
//! 3. Reports how many notifications were left behind
//!
//! Nothing is persisted: notifications still queued at exit are lost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::time::timeout;

use crate::notification::NotificationDispatcher;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for workers to exit (default: 30 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Handles graceful shutdown of the dispatch engine
pub struct GracefulShutdown {
    dispatcher: Arc<NotificationDispatcher>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self::with_config(dispatcher, ShutdownConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(dispatcher: Arc<NotificationDispatcher>, config: ShutdownConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Execute graceful shutdown sequence
    ///
    /// Returns a ShutdownResult with details about the shutdown process
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(active_workers = self.dispatcher.stats().active_workers)
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - stopping workers");

        match timeout(self.config.drain_timeout, self.dispatcher.stop()).await {
            Ok(()) => {
                result.success = true;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.drain_timeout.as_secs(),
                    active_workers = self.dispatcher.stats().active_workers,
                    "Workers did not stop before the drain timeout"
                );
            }
        }

        let stats = self.dispatcher.stats();
        result.pending_primary = stats.primary_queue_depth;
        result.pending_retry = stats.retry_queue_depth;
        result.duration = start.elapsed();

        if result.pending_primary + result.pending_retry > 0 {
            tracing::warn!(
                pending_primary = result.pending_primary,
                pending_retry = result.pending_retry,
                "Undelivered notifications discarded"
            );
        }

        tracing::info!(
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether all workers exited within the drain timeout
    pub success: bool,
    /// Notifications left in the primary queue
    pub pending_primary: usize,
    /// Notifications left in the retry queue
    pub pending_retry: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
///
/// If a handler can not be installed the error is logged and that source is
/// ignored.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
