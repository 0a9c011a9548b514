//! Unified server error type.
//!
//! Handlers that fail hard return `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON-body HTTP
//! response with an appropriate status code.
//!
//! Store failures never come through here: the read endpoints answer them
//! with a degraded `{"detail": ...}` body instead. Inference failures are
//! logged with full detail; the caller only sees a short message so file
//! paths never leak.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jobmarket_core::{InferenceError, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// A prediction field was missing or unselected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The model could not produce a prediction.
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::Validation(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": e.to_string(), "field": e.field() })),
                )
                    .into_response();
            }
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),

            ServerError::Inference(InferenceError::ArtifactMissing(path)) => {
                error!(path = %path.display(), "model artifact missing");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "prediction model is not available".to_owned(),
                )
            }
            ServerError::Inference(e) => {
                error!(error = %e, "inference failed");
                let message = match e {
                    InferenceError::SchemaMismatch(_) => {
                        "prediction model rejected the input row".to_owned()
                    }
                    InferenceError::InvalidOutput(_) => {
                        "prediction model returned an invalid salary".to_owned()
                    }
                    _ => "prediction model failed".to_owned(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn validation_is_a_client_error() {
        let res = ServerError::from(ValidationError::Missing("rome_code")).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_artifact_is_unavailable_not_internal() {
        let res = ServerError::from(InferenceError::ArtifactMissing(PathBuf::from("m.json")))
            .into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let res = ServerError::from(InferenceError::InvalidOutput(-1.0)).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
