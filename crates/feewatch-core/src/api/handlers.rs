//! API handlers for the HTTP REST API

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::codec;
use crate::collector::MetricSource;
use crate::error::Error;
use crate::models::AlertEnvelope;
use crate::relay::Relay;
use crate::scheduler::SchedulerStatus;
use crate::trap::Trap;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub trap: Arc<dyn Trap>,
    pub source: Arc<dyn MetricSource>,
    pub relay: Relay,
    pub status: Arc<RwLock<SchedulerStatus>>,
}

type ApiError = (StatusCode, String);

fn api_error(err: Error) -> ApiError {
    let status = match err {
        Error::Decode(_) => StatusCode::BAD_REQUEST,
        Error::Source(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Collect response
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectResponse {
    pub block: u64,
    pub sample: u64,
    pub payload: String,
}

/// Snapshot the source and collect one sample
pub async fn collect(State(state): State<AppState>) -> Result<Json<CollectResponse>, ApiError> {
    let snapshot = state.source.snapshot().await.map_err(api_error)?;
    let payload = state.trap.collect(&snapshot);

    Ok(Json(CollectResponse {
        block: snapshot.number,
        sample: snapshot.base_fee,
        payload: codec::to_hex(&payload),
    }))
}

/// Decision request; history is newest first
#[derive(Debug, Serialize, Deserialize)]
pub struct ShouldRespondRequest {
    pub history: Vec<String>,
}

/// Decision response
#[derive(Debug, Serialize, Deserialize)]
pub struct ShouldRespondResponse {
    pub triggered: bool,
    pub reason: Option<String>,
    pub reason_hex: String,
}

/// Evaluate the trap over a caller-supplied history
pub async fn should_respond(
    State(state): State<AppState>,
    Json(req): Json<ShouldRespondRequest>,
) -> Result<Json<ShouldRespondResponse>, ApiError> {
    let history = req
        .history
        .iter()
        .map(|entry| codec::from_hex(entry))
        .collect::<crate::error::Result<Vec<_>>>()
        .map_err(api_error)?;

    let decision = state.trap.should_respond(&history).map_err(api_error)?;

    Ok(Json(ShouldRespondResponse {
        triggered: decision.triggered,
        reason: decision.reason_text().ok(),
        reason_hex: codec::to_hex(&decision.reason),
    }))
}

/// Broadcast request
#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub data: String,
}

/// Emit a payload through the relay
pub async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<AlertEnvelope>), ApiError> {
    let payload = codec::from_hex(&req.data).map_err(api_error)?;
    let event = state.relay.broadcast(payload);

    Ok((
        StatusCode::ACCEPTED,
        Json(AlertEnvelope::new(state.relay.event_name(), &event)),
    ))
}

/// Current scheduler status
pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.status.read().clone())
}

/// SSE stream of relay events
pub async fn stream_alerts(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event_name = state.relay.event_name().to_string();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(state.relay.subscribe()).filter_map(move |item| {
        let event = item.ok()?;
        let envelope = AlertEnvelope::new(&event_name, &event);
        let data = serde_json::to_string(&envelope).ok()?;
        Some(Ok(Event::default().event(event_name.as_str()).data(data)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}
