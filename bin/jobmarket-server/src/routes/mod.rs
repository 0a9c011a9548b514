//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID span)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `JOBMARKET_ENABLE_SWAGGER=false`)
//! - Liveness and store health routes
//! - Postings listing, job-offer statistics and model metrics
//! - Salary prediction

pub mod doc;
mod health;
mod metrics;
mod postings;
mod predict;
mod stats;

use std::sync::Arc;

use axum::{Json, Router, middleware};
use jobmarket_core::StoreError;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tracing::error;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(postings::router())
        .merge(metrics::router())
        .merge(stats::router())
        .merge(predict::router());

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

/// The read endpoints answer a store failure with HTTP 200 and a
/// `{"detail": ...}` body, which is what the dashboard expects.
fn degraded(endpoint: &'static str, err: &StoreError) -> Json<Value> {
    error!(endpoint, error = %err, "store read failed; returning detail body");
    Json(json!({ "detail": format!("Error fetching {endpoint}: {err}") }))
}
