//! Svix client against a local mock of the message API

use std::time::Duration;

use serde_json::{json, Map, Value};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use hook_relay::config::SvixConfig;
use hook_relay::delivery::{DeliveryClient, DeliveryError, DeliveryRequest, SvixClient};

const MESSAGES_PATH: &str = "/api/v1/app/app_test/msg/";

fn client(server: &MockServer) -> SvixClient {
    SvixClient::new(&SvixConfig {
        api_key: "testsk_secret.eu".to_string(),
        app_id: "app_test".to_string(),
        server_url: Some(server.uri()),
        timeout_seconds: 1,
        ..Default::default()
    })
    .unwrap()
}

fn payload() -> Map<String, Value> {
    json!({"order_id": 42}).as_object().cloned().unwrap()
}

fn request<'a>(id: &'a str, payload: &'a Map<String, Value>) -> DeliveryRequest<'a> {
    DeliveryRequest {
        event_type: "order.created",
        event_id: id,
        payload,
        idempotency_key: id,
        attempt: 0,
    }
}

#[tokio::test]
async fn test_message_created() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(header("authorization", "Bearer testsk_secret.eu"))
        .and(header("idempotency-key", "evt_1"))
        .and(body_json(json!({
            "eventType": "order.created",
            "eventId": "evt_1",
            "payload": {"order_id": 42}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "msg_1"})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = payload();
    client(&server).deliver(request("evt_1", &payload)).await.unwrap();
}

#[tokio::test]
async fn test_empty_id_omits_event_id_and_idempotency_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_json(json!({
            "eventType": "order.created",
            "payload": {"order_id": 42}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let payload = payload();
    client(&server).deliver(request("", &payload)).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("idempotency-key"));
}

#[tokio::test]
async fn test_server_error_is_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let payload = payload();
    let err = client(&server)
        .deliver(request("evt_1", &payload))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(err.is_retriable());
    match err {
        DeliveryError::Api { body, .. } => assert_eq!(body, "upstream unavailable"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_throttled_is_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "1"))
        .mount(&server)
        .await;

    let payload = payload();
    let err = client(&server)
        .deliver(request("evt_1", &payload))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_validation_error_is_not_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"code": "validation"})))
        .mount(&server)
        .await;

    let payload = payload();
    let err = client(&server)
        .deliver(request("evt_1", &payload))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert!(!err.is_retriable());
    assert_eq!(err.kind(), "client_error");
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let payload = payload();
    let err = client(&server)
        .deliver(request("evt_1", &payload))
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::Transport(_)));
    assert_eq!(err.status(), None);
    assert!(!err.is_retriable());
}
