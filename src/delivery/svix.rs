//! Svix REST client for message creation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::SvixConfig;

use super::{DeliveryClient, DeliveryError, DeliveryRequest};

pub const DEFAULT_SVIX_URL: &str = "https://api.svix.com";

/// Regions encoded as a suffix of Svix API keys (`<key>.eu`)
const SVIX_REGIONS: [&str; 5] = ["us", "eu", "in", "ca", "au"];

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Body of `POST /api/v1/app/{app_id}/msg/`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SvixMessage<'a> {
    pub event_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<&'a str>,
    pub payload: &'a Map<String, Value>,
}

/// Delivers notifications as Svix messages for a single application.
#[derive(Debug, Clone)]
pub struct SvixClient {
    http: reqwest::Client,
    messages_url: String,
}

impl SvixClient {
    /// Build a client from settings.
    ///
    /// Uses `server_url` when configured, otherwise the regional endpoint
    /// encoded in the API key.
    pub fn new(config: &SvixConfig) -> Result<Self, DeliveryError> {
        let base_url = match config.server_url.as_deref() {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => regional_base_url(&config.api_key),
        };

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| DeliveryError::Configuration(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("hook-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let messages_url = format!("{}/api/v1/app/{}/msg/", base_url, config.app_id);
        tracing::info!(url = %messages_url, "Svix client configured");

        Ok(Self { http, messages_url })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait]
impl DeliveryClient for SvixClient {
    async fn deliver(&self, request: DeliveryRequest<'_>) -> Result<(), DeliveryError> {
        let event_id = Some(request.event_id).filter(|id| !id.is_empty());
        let body = SvixMessage {
            event_type: request.event_type,
            event_id,
            payload: request.payload,
        };

        let mut http_request = self.http.post(&self.messages_url).json(&body);
        if !request.idempotency_key.is_empty() {
            http_request = http_request.header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key);
        }

        let response = http_request.send().await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!(
                event_id = %request.event_id,
                status = status.as_u16(),
                "Svix accepted message"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::api(status.as_u16(), body))
    }
}

/// Base URL for the region suffix of an API key, falling back to the global API.
pub fn regional_base_url(api_key: &str) -> String {
    match api_key.rsplit_once('.') {
        Some((_, region)) if SVIX_REGIONS.contains(&region) => {
            format!("https://api.{region}.svix.com")
        }
        _ => DEFAULT_SVIX_URL.to_string(),
    }
}
