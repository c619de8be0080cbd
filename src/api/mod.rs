//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod notifications;
mod routes;

pub use health::{health, stats, HealthResponse};
pub use metrics::prometheus_metrics;
pub use notifications::{create_notification, NotificationAccepted};
pub use routes::api_routes;
