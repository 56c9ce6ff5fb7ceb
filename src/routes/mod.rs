//! HTTP surface of the gateway. Diagnostic only.

use std::sync::Arc;

use axum::Router;

use crate::ingest::IngestStats;

mod health;

// ---

pub fn router(stats: Arc<IngestStats>) -> Router {
    // ---
    Router::new().merge(health::router()).with_state(stats)
}
