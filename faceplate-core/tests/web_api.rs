//! Router-level tests for the HTTP surface.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use faceplate_core::frontends::provider_embed::EmbedFrontend;
use faceplate_core::handlers::mock::MockHandler;
use faceplate_core::mic_level::MicLevelMonitor;
use faceplate_core::notifications::{BroadcastBus, Notification};
use faceplate_core::signal::ConnectivityReading;
use faceplate_core::web_server::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Harness {
    app: axum::Router,
    bus: BroadcastBus,
    handler: Arc<MockHandler>,
}

fn harness() -> Harness {
    harness_with_mic(None)
}

fn harness_with_mic(mic: Option<MicLevelMonitor>) -> Harness {
    let bus = BroadcastBus::default();
    let handler = Arc::new(MockHandler::with_delay(Duration::ZERO));
    let state = Arc::new(AppState {
        bus: Arc::new(bus.clone()),
        handler: handler.clone(),
        connectivity: handler.clone(),
        frontend: Arc::new(EmbedFrontend::new()),
        mic,
    });
    Harness {
        app: router(state),
        bus,
        handler,
    }
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn connect_body(security_type: Value, password: &str, is_start_up: bool) -> Value {
    json!({
        "connectionName": "HomeNet",
        "devicePath": "/org/freedesktop/NetworkManager/Devices/3",
        "specificPath": "/org/freedesktop/NetworkManager/AccessPoint/7",
        "isStartUp": is_start_up,
        "securityType": security_type,
        "password": password,
    })
}

#[tokio::test]
async fn validate_reports_reason() {
    let h = harness();
    let (status, body) = post_json(
        &h.app,
        "/api/network/validate",
        json!({ "securityType": "staticWep", "password": "ABCD" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert!(body["reason"].is_string());

    let (_, body) = post_json(
        &h.app,
        "/api/network/validate",
        json!({ "securityType": 4, "password": "longenough1" }),
    )
    .await;
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["reason"], Value::Null);
}

#[tokio::test]
async fn validate_numeric_string_security_type_as_wep() {
    let h = harness();
    let (_, body) = post_json(
        &h.app,
        "/api/network/validate",
        json!({ "securityType": "1", "password": "ABCDE" }),
    )
    .await;
    assert_eq!(body["valid"], json!(true));

    // 8 chars is a fine WPA key but not a WEP key
    let (_, body) = post_json(
        &h.app,
        "/api/network/validate",
        json!({ "securityType": "1", "password": "ABCDEFGH" }),
    )
    .await;
    assert_eq!(body["valid"], json!(false));
}

#[tokio::test]
async fn connect_accepts_and_dispatches() {
    let h = harness();
    let mut rx = h.bus.subscribe();

    let (status, body) = post_json(
        &h.app,
        "/api/network/connect",
        connect_body(json!("openOrWpa"), "longenough1", false),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("connecting"));
    assert_eq!(rx.try_recv().ok(), Some(Notification::Connecting));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let requests = h.handler.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].specific_path, "/org/freedesktop/NetworkManager/AccessPoint/7");
}

#[tokio::test]
async fn connect_rejects_bad_wep_key() {
    let h = harness();
    let mut rx = h.bus.subscribe();

    let (status, body) = post_json(
        &h.app,
        "/api/network/connect",
        connect_body(json!(1), "ABCD", false),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.handler.requests().is_empty());
}

#[tokio::test]
async fn back_respects_start_up() {
    let h = harness();
    let mut rx = h.bus.subscribe();

    let (_, body) = post_json(&h.app, "/api/network/back", json!({ "isStartUp": true })).await;
    assert_eq!(body["navigated"], json!(false));
    assert!(rx.try_recv().is_err());

    let (_, body) = post_json(&h.app, "/api/network/back", json!({})).await;
    assert_eq!(body["navigated"], json!(true));
    assert_eq!(rx.try_recv().ok(), Some(Notification::DeviceSettings));
}

#[tokio::test]
async fn strength_from_query_and_live_reading() {
    let h = harness();

    let (_, body) = get_json(&h.app, "/api/network/strength?status=4").await;
    assert_eq!(body["length"], json!(1.0));
    assert_eq!(body["opacity"], json!(1.0));

    let (_, body) = get_json(&h.app, "/api/network/strength?status=garbage").await;
    assert_eq!(body["status"], json!("unknown"));

    h.handler.set_reading(ConnectivityReading::Connecting);
    let (_, body) = get_json(&h.app, "/api/network/strength").await;
    assert_eq!(body["status"], json!("connecting"));
}

#[tokio::test]
async fn mic_level_without_monitor_is_zero() {
    let h = harness();
    let (status, body) = get_json(&h.app, "/api/mic/level").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], json!(0));
}

#[tokio::test]
async fn mic_listening_drives_live_monitor() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "Energy:  cur=2 thresh=1.5\n").unwrap();
    let (monitor, task) =
        MicLevelMonitor::spawn(file.path().to_path_buf(), Duration::from_millis(10));
    let mut rx = monitor.subscribe();
    let h = harness_with_mic(Some(monitor.clone()));

    let (status, _) = post_json(&h.app, "/api/mic/listening", json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(monitor.is_listening());
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .unwrap()
        .unwrap();

    let (_, body) = get_json(&h.app, "/api/mic/level").await;
    assert_eq!(body["level"], json!(10));
    assert_eq!(monitor.peak(), 2.0);

    // a new recording halves the peak
    let (status, _) = post_json(&h.app, "/api/mic/listening", json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(monitor.peak(), 1.0);

    let (status, _) = post_json(&h.app, "/api/mic/listening/end", json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!monitor.is_listening());

    task.abort();
}

#[tokio::test]
async fn serves_index_and_404s_unknown_assets() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/missing.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
