//! ==============================================================================
//! api.rs - http/json boundary and websocket push channel
//! ==============================================================================
//!
//! routes:
//!     POST /api/sensor-data     ingest one reading from a device
//!     GET  /api/sensor-data     recent readings (?limit=N), newest first
//!     GET  /api/thresholds      current alert bounds
//!     PUT  /api/thresholds      partial update of the alert bounds
//!     GET  /api/dashboard       latest reading + thresholds + 24h stats
//!     GET  /api/status          liveness
//!     GET  /ws                  push channel (newData / thresholds events)
//!
//! ==============================================================================

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::{DashboardSnapshot, IngestRequest, StatusReport, Thresholds, ThresholdsUpdate};
use crate::error::{ApiError, ApiResult, DashboardError};
use crate::events::{DashboardEvent, EventBus};
use crate::feed::ExternalSource;
use crate::store::{self, Aggregator};

// ==============================================================================
// shared state
// ==============================================================================
// cheap to clone: every field is a handle. the aggregator carries its own
// lock, so handlers never hold anything across the external fetch.

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub feed: Arc<dyn ExternalSource>,
    pub events: EventBus,
    /// log every ingested reading at info level
    pub show_sensor_data: bool,
}

impl AppState {
    pub fn new(aggregator: Aggregator, feed: Arc<dyn ExternalSource>, events: EventBus) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            feed,
            events,
            show_sensor_data: false,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensor-data", get(list_handler).post(ingest_handler))
        .route("/api/thresholds", get(get_thresholds_handler).put(update_thresholds_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==============================================================================
// handlers
// ==============================================================================

async fn ingest_handler(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload.map_err(rejection)?;
    let reading = state.aggregator.ingest(&request).await?;

    if state.show_sensor_data {
        tracing::info!(
            device_id = %reading.device_id,
            temperature = reading.temperature,
            humidity = reading.humidity,
            light = reading.light,
            alert = reading.alert,
            "Reading received"
        );
    } else {
        tracing::debug!(device_id = %reading.device_id, alert = reading.alert, "Reading received");
    }

    state.events.publish(DashboardEvent::NewReading(reading.clone()));
    Ok(Json(json!({ "success": true, "data": reading })))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<String>,
}

async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    let limit = store::parse_limit(params.limit.as_deref());
    let recent = state.aggregator.list_recent(limit, state.feed.as_ref()).await;
    Json(json!({
        "success": true,
        "data": recent.readings,
        "total": recent.total,
    }))
}

async fn get_thresholds_handler(State(state): State<AppState>) -> Json<Thresholds> {
    Json(state.aggregator.thresholds().await)
}

async fn update_thresholds_handler(
    State(state): State<AppState>,
    payload: Result<Json<ThresholdsUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = payload.map_err(rejection)?;
    let thresholds = state.aggregator.update_thresholds(&update).await?;

    tracing::info!(
        temperature_max = thresholds.temperature_max,
        humidity_min = thresholds.humidity_min,
        light_min = thresholds.light_min,
        "Thresholds updated"
    );

    state.events.publish(DashboardEvent::ThresholdsChanged(thresholds));
    Ok(Json(json!({ "success": true, "thresholds": thresholds })))
}

async fn dashboard_handler(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.aggregator.snapshot(state.feed.as_ref()).await)
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.aggregator.status().await)
}

fn rejection(err: JsonRejection) -> ApiError {
    ApiError(DashboardError::Validation(err.body_text()))
}

// ==============================================================================
// push channel
// ==============================================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Seeds the client with the current thresholds, then forwards bus events
/// until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    // subscribe first so nothing published during the greeting is lost
    let mut rx = state.events.subscribe();
    let (mut sink, mut stream) = socket.split();
    tracing::info!(listeners = state.events.listener_count(), "Dashboard connected");

    let greeting = DashboardEvent::ThresholdsChanged(state.aggregator.thresholds().await);
    if send_event(&mut sink, &greeting).await.is_err() {
        return;
    }

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        tracing::debug!("Dashboard socket closed");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dashboard listener lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Dashboard socket receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!("Dashboard disconnected");
}

async fn send_event<S>(sink: &mut S, event: &DashboardEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
