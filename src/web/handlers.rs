//! HTTP handlers for the readings endpoints.

use crate::hardware::{parse_duty, SharedFan};
use crate::sensors::Reading;
use crate::snapshot::ReadingSnapshot;
use crate::storage::QueryEngine;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ReadingSnapshot>,
    pub engine: QueryEngine,
    pub fan: Option<SharedFan>,
}

impl AppState {
    pub fn new(snapshot: Arc<ReadingSnapshot>, engine: QueryEngine) -> Self {
        Self {
            snapshot,
            engine,
            fan: None,
        }
    }

    pub fn with_fan(mut self, fan: SharedFan) -> Self {
        self.fan = Some(fan);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadingsParams {
    pub fan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphParams {
    pub time: Option<String>,
}

/// Current reading; `?fan=N` also sets the fan duty cycle.
pub async fn get_readings(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Json<Reading> {
    if let Some(raw) = params.fan.as_deref() {
        apply_fan(&state, raw).await;
    }
    Json(Reading::clone(&state.snapshot.get()))
}

async fn apply_fan(state: &AppState, raw: &str) {
    let Some(fan) = state.fan.as_ref() else {
        debug!("Ignoring fan request, no fan configured");
        return;
    };
    let Some(percent) = parse_duty(raw) else {
        warn!("Ignoring invalid fan duty cycle {:?}", raw);
        return;
    };
    if let Err(e) = fan.lock().await.set_duty_cycle(percent) {
        error!("Failed to set fan speed: {}", e);
    }
}

/// Stored readings for `?time=day|week|month|year`.
pub async fn get_graph(
    State(state): State<AppState>,
    Query(params): Query<GraphParams>,
) -> Result<Json<Vec<Reading>>, StatusCode> {
    let token = params.time.unwrap_or_default();
    match state.engine.query_token(&token).await {
        Ok(readings) => Ok(Json(readings)),
        Err(e) => {
            error!("Failed to query {:?} history: {}", token, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "enviro-web",
        "version": env!("CARGO_PKG_VERSION"),
        "last_reading": state.snapshot.get().formatted_time(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
