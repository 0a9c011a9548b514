//! Job-offer statistics snapshot.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;

use crate::routes::degraded;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(job_offer_stats))]
pub struct StatsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/job-offer-stats", get(job_offer_stats))
}

/// Fresh statistics over every posting. Individual statistics whose query
/// failed are `null`.
#[utoipa::path(
    get,
    path = "/job-offer-stats",
    tag = "statistics",
    responses(
        (status = 200, description = "`{\"status\": \"success\", \"data\": [snapshot]}` or `{\"detail\": ...}`", body = Value)
    )
)]
pub async fn job_offer_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.aggregator.compute_snapshot().await {
        Ok(snapshot) => {
            for (name, reason) in snapshot.failures() {
                warn!(statistic = name, reason, "statistic published as null");
            }
            Json(json!({ "status": "success", "data": [snapshot] }))
        }
        Err(e) => degraded("job offer statistics", &e),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::get;
    use crate::state::testing::{posting, state};
    use axum::http::StatusCode;
    use chrono::NaiveDate;
    use jobmarket_core::store::memory::{MemoryJobStore, MemoryMetricsStore};
    use jobmarket_core::{PredictionService, Statistic};
    use tracing_test::traced_test;

    fn jobs() -> MemoryJobStore {
        let created = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap();
        MemoryJobStore::new(vec![
            posting("CDI", Some(30000.0), "75002", created),
            posting("CDD", Some(45000.0), "69001", created),
            posting("CDI", Some(60000.0), "75015", created),
        ])
        .with_today(created)
    }

    fn app(jobs: MemoryJobStore) -> std::sync::Arc<crate::state::AppState> {
        state(
            jobs,
            MemoryMetricsStore::default(),
            PredictionService::from_artifact("/nonexistent.json"),
        )
    }

    #[tokio::test]
    async fn snapshot_is_wrapped_in_a_single_element_array() {
        let (status, body) = get(app(jobs()), "/job-offer-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);

        let snapshot = &data[0];
        assert_eq!(snapshot["max_salary"], 60000.0);
        assert_eq!(snapshot["max_salary_region"], "75");
        assert_eq!(snapshot["pct_cdi"], 66.67);
        assert_eq!(snapshot["mean_salary"], 45000.0);
        assert_eq!(snapshot["total_offers"], 3);
        assert_eq!(snapshot["new_offers_today"], 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn failing_statistic_is_null_and_logged() {
        let (status, body) = get(app(jobs().failing(Statistic::PctCdi)), "/job-offer-stats").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot = &body["data"][0];
        assert!(snapshot["pct_cdi"].is_null());
        assert_eq!(snapshot["total_offers"], 3);
        assert!(logs_contain("statistic published as null"));
    }

    #[tokio::test]
    async fn unreachable_store_degrades_to_a_detail_body() {
        let (status, body) = get(app(MemoryJobStore::default().unreachable()), "/job-offer-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["detail"].as_str().unwrap().contains("jobs store unavailable"));
    }
}
