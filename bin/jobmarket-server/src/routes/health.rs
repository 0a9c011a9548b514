//! Liveness and store health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use jobmarket_core::StoreError;
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_root, get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
}

/// Liveness probe used by the dashboard.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "API is up", body = Value)
    )
)]
pub async fn get_root() -> Json<Value> {
    Json(json!({ "status": "API is running successfully" }))
}

/// Heartbeat with one ping per store.
///
/// Always HTTP 200; `status` is `"degraded"` when either store is down.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server and store health", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (jobs, metrics) = tokio::join!(state.jobs.ping(), state.metrics.ping());
    let status = if jobs.is_ok() && metrics.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(json!({
        "status":  status,
        "version": env!("CARGO_PKG_VERSION"),
        "stores": {
            "jobs":    describe(&jobs),
            "metrics": describe(&metrics),
        },
        "model_loaded": state.predictor.is_loaded(),
    }))
}

fn describe(ping: &Result<(), StoreError>) -> String {
    match ping {
        Ok(()) => "ok".to_owned(),
        Err(e) => e.to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
