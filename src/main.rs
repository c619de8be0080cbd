use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;

use hook_relay::config::Settings;
use hook_relay::delivery::SvixClient;
use hook_relay::notification::NotificationDispatcher;
use hook_relay::server::{create_app, AppState};
use hook_relay::shutdown::{self, GracefulShutdown, ShutdownConfig};
use hook_relay::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    telemetry::init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    // Create delivery client and dispatch engine
    let client = Arc::new(SvixClient::new(&settings.svix)?);
    let dispatcher_config = settings.dispatcher_config();
    let worker_count = dispatcher_config.worker_count;
    let dispatcher = Arc::new(NotificationDispatcher::new(dispatcher_config, client));
    dispatcher.start(worker_count);

    let shutdown_config = ShutdownConfig {
        drain_timeout: Duration::from_secs(settings.dispatch.shutdown_timeout_seconds),
    };

    // Create Axum app
    let addr = settings.server_addr();
    let state = AppState::new(settings, dispatcher.clone());
    let app = create_app(state);

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server until a termination signal arrives
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    // Stop the workers once no more requests can enqueue
    let result = GracefulShutdown::with_config(dispatcher, shutdown_config)
        .execute("server shutdown")
        .await;

    if !result.success {
        tracing::warn!("Shutdown did not complete cleanly");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
