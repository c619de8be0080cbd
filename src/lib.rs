// Shared components
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Dispatch engine
pub mod delivery;
pub mod notification;
pub mod queue;
pub mod ratelimit;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
