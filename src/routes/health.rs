// src/routes/health.rs
//! Health check endpoint for the fire gateway.
//!
//! Container orchestrators and operators use `/health` to verify that the
//! process is up and to see where the ingestion loop stands: its connection
//! state and how many messages fell into each failure category.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ingest::{IngestStats, StatsSnapshot};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    ingest: StatsSnapshot,
}

/// Handle `GET /health`.
///
/// Reads the shared counters only; never touches the broker or the database.
async fn health(State(stats): State<Arc<IngestStats>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ingest: stats.snapshot(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<Arc<IngestStats>> {
    Router::new().route("/health", get(health))
}
