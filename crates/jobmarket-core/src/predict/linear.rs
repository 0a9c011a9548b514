//! One-hot linear regression exported as JSON.
//!
//! ```json
//! {
//!   "intercept": 24000.0,
//!   "features": ["rome_code", "contract_type", "experience_required_months", "department"],
//!   "numeric": { "experience_required_months": 95.0 },
//!   "categorical": {
//!     "contract_type": { "CDI": 3100.0, "CDD": -450.0 },
//!     "department": { "75": 5200.0 }
//!   }
//! }
//! ```
//!
//! Categories absent from the artifact contribute nothing, the same as a
//! one-hot encoder that ignores unknown values.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::SalaryModel;
use crate::error::InferenceError;
use crate::features::{FeatureValue, PredictionRequest};

const NUMERIC_FEATURES: [&str; 1] = ["experience_required_months"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearSalaryModel {
    intercept: f64,
    /// Features the model was trained on.
    features: Vec<String>,
    #[serde(default)]
    numeric: HashMap<String, f64>,
    #[serde(default)]
    categorical: HashMap<String, HashMap<String, f64>>,
}

impl LinearSalaryModel {
    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        let load_failed = |message: String| InferenceError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        let model: Self = serde_json::from_str(&text).map_err(|e| load_failed(e.to_string()))?;
        model.check_schema()?;
        Ok(model)
    }

    pub fn from_json_str(text: &str) -> Result<Self, InferenceError> {
        let model: Self = serde_json::from_str(text)
            .map_err(|e| InferenceError::SchemaMismatch(e.to_string()))?;
        model.check_schema()?;
        Ok(model)
    }

    /// Every trained feature must exist in the request row, and every
    /// coefficient table must belong to a trained feature of the right kind.
    fn check_schema(&self) -> Result<(), InferenceError> {
        for name in &self.features {
            if !PredictionRequest::FEATURE_NAMES.contains(&name.as_str()) {
                return Err(InferenceError::SchemaMismatch(format!(
                    "model expects unknown feature `{name}`"
                )));
            }
        }
        for name in self.numeric.keys() {
            if !NUMERIC_FEATURES.contains(&name.as_str()) || !self.features.contains(name) {
                return Err(InferenceError::SchemaMismatch(format!(
                    "`{name}` is not a numeric input of this model"
                )));
            }
        }
        for name in self.categorical.keys() {
            if NUMERIC_FEATURES.contains(&name.as_str()) || !self.features.contains(name) {
                return Err(InferenceError::SchemaMismatch(format!(
                    "`{name}` is not a categorical input of this model"
                )));
            }
        }
        Ok(())
    }
}

impl SalaryModel for LinearSalaryModel {
    fn predict(&self, row: &PredictionRequest) -> Result<f64, InferenceError> {
        let mut salary = self.intercept;
        for (name, value) in row.feature_row() {
            if !self.features.iter().any(|f| f == name) {
                continue;
            }
            salary += match value {
                FeatureValue::Number(v) => self.numeric.get(name).map_or(0.0, |coef| coef * v),
                FeatureValue::Text(category) => self
                    .categorical
                    .get(name)
                    .and_then(|weights| weights.get(category))
                    .copied()
                    .unwrap_or(0.0),
            };
        }
        Ok(salary)
    }
}
