//! Integration tests for the dashboard JSON API.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use sensor_dashboard::api::{self, AppState};
use sensor_dashboard::domain::ExternalReading;
use sensor_dashboard::error::DashboardError;
use sensor_dashboard::events::{DashboardEvent, EventBus};
use sensor_dashboard::feed::{ExternalSource, NoFeed};
use sensor_dashboard::store::Aggregator;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

struct DownFeed;

#[async_trait]
impl ExternalSource for DownFeed {
    async fn fetch(&self) -> Result<Vec<ExternalReading>, DashboardError> {
        Err(DashboardError::Network("timed out".into()))
    }
}

struct OneReadingFeed;

#[async_trait]
impl ExternalSource for OneReadingFeed {
    async fn fetch(&self) -> Result<Vec<ExternalReading>, DashboardError> {
        Ok(vec![ExternalReading {
            id: "remote-42".into(),
            device_id: Some("esp32_009".into()),
            temperature: 18.0,
            humidity: 65.0,
            light: 300,
            timestamp: Utc::now(),
        }])
    }
}

fn app_with(feed: Arc<dyn ExternalSource>) -> (Router, EventBus) {
    let events = EventBus::new();
    let state = AppState::new(Aggregator::default(), feed, events.clone());
    (api::router(state), events)
}

fn app() -> Router {
    app_with(Arc::new(NoFeed)).0
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn ingest(app: &Router, temperature: f64) -> Value {
    let (status, json) = send(
        app,
        Method::POST,
        "/api/sensor-data",
        Some(json!({ "temperature": temperature, "humidity": 50, "light": 600 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["data"].clone()
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_accepts_string_numerics() {
    let app = app();
    let (status, json) = send(
        &app,
        Method::POST,
        "/api/sensor-data",
        Some(json!({ "temperature": "22.5", "humidity": "55", "light": "600" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["temperature"], 22.5);
    assert_eq!(json["data"]["humidity"], 55.0);
    assert_eq!(json["data"]["light"], 600);
    assert_eq!(json["data"]["alert"], false);
    assert_eq!(json["data"]["device_id"], "esp32_001");
    assert!(json["data"]["id"].is_u64());
    assert!(json["data"]["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn ingest_rejects_non_numeric_input() {
    let app = app();
    let (status, json) = send(
        &app,
        Method::POST,
        "/api/sensor-data",
        Some(json!({ "temperature": "hot", "humidity": 50, "light": 600 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("temperature"));

    // the server keeps working and nothing was stored
    let (_, status_json) = send(&app, Method::GET, "/api/status", None).await;
    assert_eq!(status_json["total_readings"], 0);
}

#[tokio::test]
async fn malformed_body_uses_the_error_shape() {
    let app = app();
    let (status, json) = send(
        &app,
        Method::POST,
        "/api/sensor-data",
        Some(json!({ "temperature": true, "humidity": 50, "light": 600 })),
    )
    .await;

    assert!(status.is_client_error());
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn ingest_publishes_new_reading_event() {
    let (app, events) = app_with(Arc::new(NoFeed));
    let mut rx = events.subscribe();

    let data = ingest(&app, 31.0).await;

    match rx.recv().await.unwrap() {
        DashboardEvent::NewReading(reading) => {
            assert_eq!(serde_json::to_value(&reading).unwrap(), data);
            assert!(reading.alert);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// thresholds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thresholds_default_and_partial_update() {
    let app = app();
    let (status, json) = send(&app, Method::GET, "/api/thresholds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "temperature_max": 30.0, "humidity_min": 40.0, "light_min": 500 }));

    let (status, json) = send(&app, Method::PUT, "/api/thresholds", Some(json!({ "humidity_min": 45 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["thresholds"]["humidity_min"], 45.0);

    let (_, json) = send(&app, Method::GET, "/api/thresholds", None).await;
    assert_eq!(json, json!({ "temperature_max": 30.0, "humidity_min": 45.0, "light_min": 500 }));
}

#[tokio::test]
async fn non_numeric_threshold_is_rejected_without_change() {
    let app = app();
    let (status, json) = send(
        &app,
        Method::PUT,
        "/api/thresholds",
        Some(json!({ "temperature_max": 28, "light_min": "dim" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (_, json) = send(&app, Method::GET, "/api/thresholds", None).await;
    assert_eq!(json["temperature_max"], 30.0);
    assert_eq!(json["light_min"], 500);
}

#[tokio::test]
async fn threshold_update_publishes_event() {
    let (app, events) = app_with(Arc::new(NoFeed));
    let mut rx = events.subscribe();

    send(&app, Method::PUT, "/api/thresholds", Some(json!({ "light_min": 450 }))).await;

    match rx.recv().await.unwrap() {
        DashboardEvent::ThresholdsChanged(t) => assert_eq!(t.light_min, 450),
        other => panic!("unexpected event: {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// listing + snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_recent_is_newest_first() {
    let app = app();
    let _a = ingest(&app, 20.0).await;
    let b = ingest(&app, 21.0).await;
    let c = ingest(&app, 22.0).await;

    let (status, json) = send(&app, Method::GET, "/api/sensor-data?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["total"], 3);
    assert_eq!(json["data"], json!([c, b]));
}

#[tokio::test]
async fn invalid_limit_uses_default() {
    let app = app();
    for t in 0..3 {
        ingest(&app, 20.0 + t as f64).await;
    }
    let (_, json) = send(&app, Method::GET, "/api/sensor-data?limit=zero", None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn dashboard_survives_feed_failure() {
    let (app, _) = app_with(Arc::new(DownFeed));
    let latest = ingest(&app, 25.0).await;

    let (status, json) = send(&app, Method::GET, "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["latest"], latest);
    assert_eq!(json["thresholds"]["temperature_max"], 30.0);
    assert_eq!(json["stats_24h"]["total_readings"], 1);
    assert_eq!(json["stats_24h"]["avg_temperature"], 25.0);

    let (status, json) = send(&app, Method::GET, "/api/sensor-data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn empty_dashboard_has_zero_stats() {
    let app = app();
    let (status, json) = send(&app, Method::GET, "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["latest"].is_null());
    assert_eq!(json["stats_24h"]["total_readings"], 0);
    assert_eq!(json["stats_24h"]["avg_temperature"], 0.0);
    assert_eq!(json["stats_24h"]["avg_light"], 0);
}

#[tokio::test]
async fn external_readings_are_merged() {
    let (app, _) = app_with(Arc::new(OneReadingFeed));
    ingest(&app, 22.0).await;

    let (_, json) = send(&app, Method::GET, "/api/dashboard", None).await;
    assert_eq!(json["latest"]["id"], "remote-42");
    assert_eq!(json["latest"]["device_id"], "esp32_009");
    // light 300 < 500 under our thresholds
    assert_eq!(json["latest"]["alert"], true);
    assert_eq!(json["stats_24h"]["total_readings"], 2);
    assert_eq!(json["stats_24h"]["avg_temperature"], 20.0);

    let (_, json) = send(&app, Method::GET, "/api/sensor-data", None).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["data"][0]["id"], "remote-42");
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_online() {
    let app = app();
    ingest(&app, 21.0).await;
    let (status, json) = send(&app, Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "online");
    assert_eq!(json["total_readings"], 1);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (status, _) = send(&app(), Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
