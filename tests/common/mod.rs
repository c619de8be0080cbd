//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::Instant;

use hook_relay::clock::ManualClock;
use hook_relay::delivery::{DeliveryClient, DeliveryError, DeliveryRequest};
use hook_relay::notification::{DispatcherConfig, Notification, NotificationDispatcher};

/// Scripted result of one delivery attempt
#[derive(Debug, Clone)]
pub enum Outcome {
    Accept,
    Status(u16),
    Unclassified,
}

/// A delivery attempt observed by `ScriptedClient`
#[derive(Debug, Clone)]
pub struct Call {
    pub event_id: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: Map<String, Value>,
    pub attempt: u32,
    pub at: Instant,
}

/// In-process provider that answers from a script and records every call.
/// Once the script runs out every call is accepted.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Wait until at least `n` calls were made
    pub async fn wait_for_calls(&self, n: usize, within: Duration) {
        tokio::time::timeout(within, async {
            while self.call_count() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {} calls, saw {}", n, self.call_count()));
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(&self, request: DeliveryRequest<'_>) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(Call {
            event_id: request.event_id.to_string(),
            event_type: request.event_type.to_string(),
            idempotency_key: request.idempotency_key.to_string(),
            payload: request.payload.clone(),
            attempt: request.attempt,
            at: Instant::now(),
        });

        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            None | Some(Outcome::Accept) => Ok(()),
            Some(Outcome::Status(status)) => Err(DeliveryError::api(status, "scripted failure")),
            Some(Outcome::Unclassified) => Err(DeliveryError::Other("scripted failure".into())),
        }
    }
}

/// Dispatcher with a generous rate limit so pacing does not affect timing
pub fn dispatcher(client: Arc<ScriptedClient>) -> Arc<NotificationDispatcher> {
    dispatcher_with(
        DispatcherConfig {
            worker_count: 2,
            queue_capacity: 32,
            rate_limit: 100,
            burst_limit: 100,
        },
        client,
    )
}

pub fn dispatcher_with(
    config: DispatcherConfig,
    client: Arc<ScriptedClient>,
) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(config, client))
}

/// Dispatcher whose retry backoff only elapses when `clock` is advanced
pub fn dispatcher_with_clock(
    client: Arc<ScriptedClient>,
    clock: Arc<ManualClock>,
) -> Arc<NotificationDispatcher> {
    let config = DispatcherConfig {
        worker_count: 2,
        queue_capacity: 32,
        rate_limit: 100,
        burst_limit: 100,
    };
    Arc::new(NotificationDispatcher::with_clock(config, client, clock))
}

/// Poll `condition` until it holds
pub async fn wait_until<F: Fn() -> bool>(condition: F, within: Duration) {
    tokio::time::timeout(within, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn notification(id: &str) -> Notification {
    let data = json!({"order_id": 42, "status": "created"});
    let data = data.as_object().cloned().unwrap_or_default();
    Notification::new(id, "order.created", data)
}
