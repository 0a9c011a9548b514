//! ONNX artifacts (e.g. a scikit-learn pipeline converted with skl2onnx).
//!
//! Each feature is fed as its own `[1, 1]` input named after the feature:
//! string tensors for categorical columns, `f32` for the month count. The
//! first output is read as the predicted salary.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{DynValue, Tensor};

use super::SalaryModel;
use crate::error::InferenceError;
use crate::features::{FeatureValue, PredictionRequest};

pub struct OnnxSalaryModel {
    session: Mutex<Session>,
}

impl fmt::Debug for OnnxSalaryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxSalaryModel").finish_non_exhaustive()
    }
}

impl OnnxSalaryModel {
    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        let load_failed = |message: String| InferenceError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let builder = Session::builder().map_err(|e| load_failed(e.to_string()))?;
        let session = builder
            .commit_from_file(path)
            .map_err(|e| load_failed(e.to_string()))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

fn input_tensor(name: &str, value: FeatureValue<'_>) -> Result<DynValue, InferenceError> {
    let tensor = match value {
        FeatureValue::Text(s) => {
            Tensor::from_string_array(([1usize, 1], vec![s.to_owned()])).map(|t| t.into_dyn())
        }
        FeatureValue::Number(v) => {
            Tensor::from_array(([1usize, 1], vec![v as f32])).map(|t| t.into_dyn())
        }
    };
    tensor.map_err(|e| InferenceError::SchemaMismatch(format!("input `{name}`: {e}")))
}

fn first_output<T>(outputs: impl IntoIterator<Item = T>) -> Result<T, InferenceError> {
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::SchemaMismatch("model has no outputs".into()))
}

impl SalaryModel for OnnxSalaryModel {
    fn predict(&self, row: &PredictionRequest) -> Result<f64, InferenceError> {
        let mut inputs: Vec<(String, DynValue)> = Vec::with_capacity(row.feature_row().len());
        for (name, value) in row.feature_row() {
            inputs.push((name.to_owned(), input_tensor(name, value)?));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Runtime("onnx session lock poisoned".into()))?;
        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::SchemaMismatch(e.to_string()))?;
        let (_, data) = first_output(outputs.values())?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        data.first()
            .map(|v| f64::from(*v))
            .ok_or_else(|| InferenceError::Runtime("model returned an empty output".into()))
    }
}
