//! Salary prediction.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use jobmarket_core::predict::round_salary;
use jobmarket_core::{RawPredictionInput, RawValue, normalize};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{OpenApi, ToSchema};

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(predict_salary),
    components(schemas(PredictSalaryRequest, PredictSalaryResponse))
)]
pub struct PredictApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict_salary))
}

/// Raw form values. Every field accepts a string or a number; `"--"`
/// counts as not selected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictSalaryRequest {
    /// ROME code, bare or as `"CODE - label"`.
    #[schema(value_type = Option<String>, example = "M1805")]
    pub rome_code: Option<RawValue>,
    #[schema(value_type = Option<String>, example = "CDI - Contrat à durée indéterminée")]
    pub contract_type: Option<RawValue>,
    /// `D` or `E`.
    #[schema(value_type = Option<String>, example = "E")]
    pub experience_required: Option<RawValue>,
    /// Unparseable values count as 0.
    #[schema(value_type = Option<f64>, example = 24)]
    pub experience_required_months: Option<RawValue>,
    #[schema(value_type = Option<String>, example = "75011")]
    pub postal_code: Option<RawValue>,
}

impl From<PredictSalaryRequest> for RawPredictionInput {
    fn from(req: PredictSalaryRequest) -> Self {
        Self {
            rome_code: req.rome_code,
            contract_type: req.contract_type,
            experience_required: req.experience_required,
            experience_required_months: req.experience_required_months,
            postal_code: req.postal_code,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictSalaryResponse {
    /// Predicted yearly salary, rounded to cents.
    pub salary: f64,
    /// Department derived from the postal code.
    pub department: String,
}

#[utoipa::path(
    post,
    path = "/predict",
    tag = "prediction",
    request_body = PredictSalaryRequest,
    responses(
        (status = 200, description = "Predicted salary", body = PredictSalaryResponse),
        (status = 400, description = "Missing or unselected field"),
        (status = 500, description = "The model failed to predict"),
        (status = 503, description = "No model artifact available"),
    )
)]
pub async fn predict_salary(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictSalaryRequest>, JsonRejection>,
) -> Result<Json<PredictSalaryResponse>, ServerError> {
    let Json(body) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let request = normalize(&body.into())?;
    let salary = round_salary(state.predictor.predict(&request).await?);
    info!(
        rome_code = request.rome_code(),
        department = request.department(),
        salary,
        "salary prediction served"
    );
    Ok(Json(PredictSalaryResponse {
        salary,
        department: request.department().to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use jobmarket_core::predict::LinearSalaryModel;
    use jobmarket_core::store::memory::{MemoryJobStore, MemoryMetricsStore};
    use jobmarket_core::{InferenceError, PredictionRequest, PredictionService, SalaryModel};
    use serde_json::json;

    use crate::routes::testing::post_json;
    use crate::state::testing::{Preloaded, empty_state, state};

    const ARTIFACT: &str = r#"{
        "intercept": 25000.0,
        "features": ["rome_code", "contract_type", "experience_required_months", "department"],
        "numeric": { "experience_required_months": 50.5 },
        "categorical": {
            "contract_type": { "CDI": 3000.0, "CDD": -1000.0 },
            "department": { "75": 4000.0, "10": 150.0 }
        }
    }"#;

    fn app_with(model: Arc<dyn SalaryModel>) -> Arc<crate::state::AppState> {
        state(
            MemoryJobStore::default(),
            MemoryMetricsStore::default(),
            PredictionService::new(Preloaded(model)),
        )
    }

    fn linear_app() -> Arc<crate::state::AppState> {
        app_with(Arc::new(LinearSalaryModel::from_json_str(ARTIFACT).unwrap()))
    }

    #[tokio::test]
    async fn predicts_from_dashboard_form_values() {
        let body = json!({
            "rome_code": "M1805 - Études et développement informatique",
            "contract_type": "CDD - Contrat à Durée Déterminée",
            "experience_required": "E",
            "experience_required_months": "abc",
            "postal_code": 1000,
        });
        let (status, res) = post_json(linear_app(), "/predict", &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["department"], "10");
        assert_eq!(res["salary"], 25000.0 - 1000.0 + 150.0);
    }

    #[tokio::test]
    async fn salary_is_rounded_to_cents() {
        let body = json!({
            "rome_code": "M1805",
            "contract_type": "CDI",
            "experience_required": "E",
            "experience_required_months": 0.333,
            "postal_code": "75011",
        });
        let (status, res) = post_json(linear_app(), "/predict", &body).await;
        assert_eq!(status, StatusCode::OK);
        // 25000 + 3000 + 4000 + 50.5 * 0.333
        assert_eq!(res["salary"], 32016.82);
    }

    #[tokio::test]
    async fn unselected_field_is_a_400_naming_the_field() {
        let body = json!({
            "rome_code": "M1805",
            "contract_type": "--",
            "experience_required": "E",
            "postal_code": "75011",
        });
        let (status, res) = post_json(linear_app(), "/predict", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(res["field"], "contract_type");
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let (status, res) = post_json(linear_app(), "/predict", &json!([1, 2, 3])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(res["error"].is_string());
    }

    #[tokio::test]
    async fn missing_artifact_is_a_503() {
        let body = json!({
            "rome_code": "M1805",
            "contract_type": "CDI",
            "experience_required": "D",
            "postal_code": "33000",
        });
        let (status, res) = post_json(empty_state(), "/predict", &body).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!res["error"].as_str().unwrap().contains("nonexistent"));
    }

    #[derive(Debug)]
    struct Broken;

    impl SalaryModel for Broken {
        fn predict(&self, _row: &PredictionRequest) -> Result<f64, InferenceError> {
            Ok(f64::NAN)
        }
    }

    #[tokio::test]
    async fn invalid_model_output_is_a_500() {
        let body = json!({
            "rome_code": "M1805",
            "contract_type": "CDI",
            "experience_required": "D",
            "postal_code": "33000",
        });
        let (status, _) = post_json(app_with(Arc::new(Broken)), "/predict", &body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
