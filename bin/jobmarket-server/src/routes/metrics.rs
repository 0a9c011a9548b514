//! Model-evaluation history.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use jobmarket_core::metrics::{collect_metrics_history, latest_metric};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::routes::degraded;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_metrics, get_latest_metric))]
pub struct MetricsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/latest", get(get_latest_metric))
}

/// Full history, in store order.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "`{\"status\": \"success\", \"data\": [...]}` or `{\"detail\": ...}`", body = Value)
    )
)]
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    match collect_metrics_history(state.metrics.as_ref()).await {
        Ok(records) => Json(json!({ "status": "success", "data": records })),
        Err(e) => degraded("metrics", &e),
    }
}

/// Most recent evaluation; same-day runs resolve to the highest id.
#[utoipa::path(
    get,
    path = "/metrics/latest",
    tag = "metrics",
    responses(
        (status = 200, description = "`{\"status\": \"success\", \"data\": record | null}` or `{\"detail\": ...}`", body = Value)
    )
)]
pub async fn get_latest_metric(State(state): State<Arc<AppState>>) -> Json<Value> {
    match collect_metrics_history(state.metrics.as_ref()).await {
        Ok(records) => Json(json!({ "status": "success", "data": latest_metric(&records) })),
        Err(e) => degraded("metrics", &e),
    }
}
