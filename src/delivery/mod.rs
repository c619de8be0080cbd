//! Outbound delivery to the webhook provider.
//!
//! The dispatcher only depends on the `DeliveryClient` trait and on being able
//! to read an HTTP status out of a failed call. `SvixClient` is the production
//! implementation.

mod error;
mod svix;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use error::DeliveryError;
pub use svix::{regional_base_url, SvixClient, SvixMessage, DEFAULT_SVIX_URL};

/// A single message handed to the provider.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
    pub event_type: &'a str,
    pub event_id: &'a str,
    pub payload: &'a Map<String, Value>,
    /// Provider-side deduplication key, the notification id
    pub idempotency_key: &'a str,
    /// Retry count of the notification at send time
    pub attempt: u32,
}

/// Interface to the webhook delivery provider.
///
/// Each call is a single attempt; retries are decided by the dispatcher.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, request: DeliveryRequest<'_>) -> Result<(), DeliveryError>;
}
