#![allow(clippy::unwrap_used)]
// Integration tests for `BridgeClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aquameter_api::{BridgeClient, Error, RetryPolicy, StatusPayload, StatusRequest};

// ── Helpers ─────────────────────────────────────────────────────────

const DEVICE_ID: &str = "bf0a1b2c3d4e5f6a7b8c9d";
const ADDRESS: &str = "192.168.20.161";

async fn setup() -> (MockServer, BridgeClient) {
    let server = MockServer::start().await;
    let client = BridgeClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, client)
}

fn local_key() -> SecretString {
    SecretString::from("0123456789abcdef".to_owned())
}

fn request(key: &SecretString, attempts: u32) -> StatusRequest<'_> {
    StatusRequest {
        device_id: DEVICE_ID,
        address: ADDRESS,
        local_key: key,
        version: "3.5",
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(attempts, Duration::ZERO),
    }
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_sends_device_parameters() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .and(body_json(json!({
            "id": DEVICE_ID,
            "ip": ADDRESS,
            "key": "0123456789abcdef",
            "version": "3.5",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devId": DEVICE_ID,
            "dps": { "8": 238, "106": 712, "111": 420 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client.status(&request(&key, 1)).await.unwrap();
    let points = payload.data_points().unwrap();

    assert_eq!(points.len(), 3);
    assert_eq!(points.get("106"), Some(&json!(712)));
}

#[tokio::test]
async fn test_status_relays_device_error() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Error": "Network Error: Device Unreachable",
            "Err": "905"
        })))
        .mount(&server)
        .await;

    let payload = client.status(&request(&key, 1)).await.unwrap();

    assert_eq!(
        payload,
        StatusPayload::DeviceError {
            code: "905".into(),
            message: "Network Error: Device Unreachable".into(),
        }
    );
}

#[tokio::test]
async fn test_empty_body_is_empty_payload() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let payload = client.status(&request(&key, 1)).await.unwrap();
    assert_eq!(payload, StatusPayload::Empty);
}

#[tokio::test]
async fn test_answer_without_dps_is_incomplete() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devId": DEVICE_ID })))
        .mount(&server)
        .await;

    let payload = client.status(&request(&key, 1)).await.unwrap();
    assert!(matches!(payload, StatusPayload::Incomplete(_)));
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_is_retried() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "dps": { "8": 240 } })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client.status(&request(&key, 3)).await.unwrap();
    assert_eq!(payload.kind(), "data_points");
}

#[tokio::test]
async fn test_retries_stop_at_attempt_limit() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("device session busy"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.status(&request(&key, 2)).await.unwrap_err();

    match err {
        Error::Bridge { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "device session busy");
        }
        other => panic!("expected Bridge error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(400).set_body_string("missing field: key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.status(&request(&key, 3)).await.unwrap_err();
    assert!(matches!(err, Error::Bridge { status: 400, .. }));
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_undecodable_body_is_deserialization_error() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.status(&request(&key, 3)).await.unwrap_err();

    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_bridge_times_out() {
    let (server, client) = setup().await;
    let key = local_key();

    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "dps": { "8": 240 } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut req = request(&key, 1);
    req.timeout = Duration::from_millis(200);

    let err = client.status(&req).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
}

#[tokio::test]
async fn test_stopped_bridge_is_unavailable() {
    // Reserve a port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    let client = BridgeClient::with_client(reqwest::Client::new(), url);
    let key = local_key();

    let err = client.status(&request(&key, 1)).await.unwrap_err();
    assert!(err.is_unavailable(), "expected Unavailable, got: {err:?}");
}
