#![allow(clippy::unwrap_used)]
// Integration tests for `PanelClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vesta_api::{Error, Method, PanelApi, PanelClient, PanelTransport, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn password() -> SecretString {
    SecretString::from("1234".to_string())
}

async fn setup() -> (MockServer, PanelClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = PanelClient::new(
        base_url,
        "installer".into(),
        password(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Wire contract ───────────────────────────────────────────────────

#[tokio::test]
async fn test_status_request_carries_auth_and_fixed_headers() {
    let (server, client) = setup().await;
    let referer = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/action/panelCondGet"))
        .and(basic_auth("installer", "1234"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Referer", referer.as_str()))
        .and(header("Accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "updates": { "mode_a1": "Disarm" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = client.fetch_status().await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["updates"]["mode_a1"], "Disarm");
}

#[tokio::test]
async fn test_device_list_is_a_get() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/action/deviceListGet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "senrows": [] })))
        .expect(1)
        .mount(&server)
        .await;

    client.fetch_devices().await.unwrap();
}

#[tokio::test]
async fn test_event_log_posts_max_count_form() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action/logsGet"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("max_count=50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "logrows": [] })))
        .expect(1)
        .mount(&server)
        .await;

    client.fetch_events(50).await.unwrap();
}

#[tokio::test]
async fn test_arm_command_posts_area_and_mode() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/action/panelCondPost"))
        .and(basic_auth("installer", "1234"))
        .and(body_string("area=1&mode=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    client.post_arm_mode(1, 2).await.unwrap();
}

// ── Error classification ────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/action/panelCondGet"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.fetch_status().await;
    assert_eq!(result, Err(Error::Auth { status: 401 }));
}

#[tokio::test]
async fn test_forbidden_maps_to_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/action/deviceListGet"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.fetch_devices().await.unwrap_err();
    assert!(err.is_auth(), "expected auth error, got: {err:?}");
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/action/panelCondGet"))
        .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    assert_eq!(
        err,
        Error::Http {
            status: 500,
            body: "busy".into()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/action/panelCondGet"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    assert!(
        matches!(err, Error::Malformed { ref body, .. } if body.contains("login")),
        "expected Malformed error, got: {err:?}"
    );
}

#[tokio::test]
async fn test_slow_panel_maps_to_timeout() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let transport = TransportConfig {
        timeout: Duration::from_millis(100),
        ..TransportConfig::default()
    };
    let client = PanelClient::new(base_url, "installer".into(), password(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/action/panelCondGet"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.fetch_status().await.unwrap_err();
    assert_eq!(err, Error::Timeout { timeout_ms: 100 });
}

#[tokio::test]
async fn test_refused_connection_maps_to_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base_url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    let client = PanelClient::new(
        base_url,
        "installer".into(),
        password(),
        &TransportConfig::default(),
    )
    .unwrap();

    let err = client
        .request(Method::Get, "action/panelCondGet", None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Connection { .. }),
        "expected Connection error, got: {err:?}"
    );
}
