//! Flattened postings listing.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::debug;
use utoipa::OpenApi;

use crate::routes::degraded;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(custom_query))]
pub struct PostingsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/custom_query", get(custom_query))
}

/// Every posting joined with its occupation label and postal reference.
#[utoipa::path(
    get,
    path = "/custom_query",
    tag = "postings",
    responses(
        (status = 200, description = "Array of postings, or `{\"detail\": ...}` when the store failed", body = Value)
    )
)]
pub async fn custom_query(State(state): State<Arc<AppState>>) -> Response {
    match state.jobs.list_postings().await {
        Ok(postings) => {
            debug!(rows = postings.len(), "postings listed");
            Json(postings).into_response()
        }
        Err(e) => degraded("postings", &e).into_response(),
    }
}
