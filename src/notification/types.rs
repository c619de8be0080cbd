use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum number of re-delivery attempts for a single notification.
pub const MAX_RETRIES: u32 = 5;

/// A notification received on the ingestion endpoint.
///
/// The descriptive fields follow the CloudEvents envelope producers send us and
/// are kept verbatim. Only `id`, `type` and `data` are used for delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    #[serde(deserialize_with = "null_as_default")]
    pub object: String,
    /// Event id, used as the provider idempotency key
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Opaque event payload
    #[serde(deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    #[serde(rename = "datacontenttype", deserialize_with = "null_as_default")]
    pub data_content_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(rename = "specversion", deserialize_with = "null_as_default")]
    pub spec_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    /// Retry bookkeeping, owned by the dispatch workers
    #[serde(skip)]
    pub metadata: NotificationMetadata,
}

/// Delivery bookkeeping attached to a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationMetadata {
    /// Number of re-delivery attempts made so far
    pub retry_count: u32,
    /// Earliest time the next re-delivery may happen
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// Returned when a notification has used up its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification {id} can not be retried more than {max} times")]
pub struct RetryBudgetExceeded {
    pub id: String,
    pub max: u32,
}

impl Notification {
    /// Create a notification with just an id, type and payload
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            data,
            ..Default::default()
        }
    }

    /// Delay before the next retry becomes eligible: `2^retry_count` seconds.
    ///
    /// There is no upper bound; with `MAX_RETRIES` at 5 the longest scheduled wait is 16s.
    pub fn retry_backoff(&self) -> Duration {
        let exponent = self.metadata.retry_count.min(62);
        Duration::seconds(1_i64 << exponent)
    }

    /// Schedule the next retry `2^retry_count` seconds after `now`.
    pub fn set_retry_time(&mut self, now: DateTime<Utc>) {
        self.metadata.next_retry_at = Some(now + self.retry_backoff());
    }

    /// True once the scheduled retry time has passed at `now`. A notification
    /// that was never scheduled is always ready.
    pub fn ready_to_retry(&self, now: DateTime<Utc>) -> bool {
        match self.metadata.next_retry_at {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Bump the retry counter and return the new value.
    ///
    /// Fails without touching the counter once it has reached `MAX_RETRIES`.
    pub fn increment_retry_count(&mut self) -> Result<u32, RetryBudgetExceeded> {
        if self.metadata.retry_count >= MAX_RETRIES {
            return Err(RetryBudgetExceeded {
                id: self.id.clone(),
                max: MAX_RETRIES,
            });
        }
        self.metadata.retry_count += 1;
        Ok(self.metadata.retry_count)
    }

    pub fn can_retry(&self) -> bool {
        self.metadata.retry_count < MAX_RETRIES
    }

    pub fn retry_count(&self) -> u32 {
        self.metadata.retry_count
    }
}

/// Decode JSON `null` as the field's empty value, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id:{} type:{} retries:{}",
            self.id, self.event_type, self.metadata.retry_count
        )
    }
}
