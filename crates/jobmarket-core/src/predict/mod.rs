//! Salary inference over the trained-model artifact.
//!
//! The artifact is loaded at most once per [`PredictionService`], on the
//! first prediction, inside `spawn_blocking`. Concurrent first calls wait on
//! the same initialisation; a failed load leaves the slot empty so a later
//! request can try again.

pub mod linear;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::InferenceError;
use crate::features::PredictionRequest;

pub use linear::LinearSalaryModel;

/// A loaded, read-only regression model.
pub trait SalaryModel: Send + Sync + fmt::Debug {
    /// Predict the salary for exactly one row.
    fn predict(&self, row: &PredictionRequest) -> Result<f64, InferenceError>;
}

/// Produces the model on first use. Runs on the blocking pool.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Arc<dyn SalaryModel>, InferenceError>;
}

/// Loads a model artifact from disk, picking the format from the file
/// extension.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    path: PathBuf,
}

impl ArtifactLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelLoader for ArtifactLoader {
    fn load(&self) -> Result<Arc<dyn SalaryModel>, InferenceError> {
        if !self.path.is_file() {
            return Err(InferenceError::ArtifactMissing(self.path.clone()));
        }
        match self.path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Arc::new(LinearSalaryModel::from_path(&self.path)?)),
            #[cfg(feature = "onnx")]
            Some("onnx") => Ok(Arc::new(onnx::OnnxSalaryModel::from_path(&self.path)?)),
            _ => Err(InferenceError::UnsupportedFormat(self.path.clone())),
        }
    }
}

pub struct PredictionService {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SalaryModel>>,
}

impl fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionService")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PredictionService {
    pub fn new(loader: impl ModelLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            model: OnceCell::new(),
        }
    }

    pub fn from_artifact(path: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactLoader::new(path))
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// The shared model, loading it if this is the first call.
    pub async fn model(&self) -> Result<Arc<dyn SalaryModel>, InferenceError> {
        self.model
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                let model = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| InferenceError::Runtime(format!("model loading task failed: {e}")))??;
                info!(model = ?model, "model artifact loaded");
                Ok::<_, InferenceError>(model)
            })
            .await
            .cloned()
    }

    /// Predict the salary for one normalized request.
    ///
    /// # Errors
    ///
    /// Any [`InferenceError`] from loading or running the model, unchanged,
    /// and [`InferenceError::InvalidOutput`] for a negative or non-finite
    /// result. There is no fallback value.
    pub async fn predict(&self, request: &PredictionRequest) -> Result<f64, InferenceError> {
        let model = self.model().await?;
        let salary = model.predict(request)?;
        if !salary.is_finite() || salary < 0.0 {
            return Err(InferenceError::InvalidOutput(salary));
        }
        debug!(
            rome_code = request.rome_code(),
            department = request.department(),
            salary,
            "salary predicted"
        );
        Ok(salary)
    }
}

/// Two-decimal rounding used when a prediction is presented.
pub fn round_salary(salary: f64) -> f64 {
    (salary * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{RawPredictionInput, RawValue, normalize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Constant(f64);

    impl SalaryModel for Constant {
        fn predict(&self, _row: &PredictionRequest) -> Result<f64, InferenceError> {
            Ok(self.0)
        }
    }

    /// Counts loads; the first `failures` attempts fail.
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        failures: usize,
        output: f64,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn SalaryModel>, InferenceError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            if n < self.failures {
                return Err(InferenceError::LoadFailed {
                    path: PathBuf::from("model.json"),
                    message: "truncated file".into(),
                });
            }
            Ok(Arc::new(Constant(self.output)))
        }
    }

    fn request() -> PredictionRequest {
        normalize(&RawPredictionInput {
            rome_code: Some("M1805".into()),
            contract_type: Some("CDI".into()),
            experience_required: Some("E".into()),
            experience_required_months: Some("24".into()),
            postal_code: Some(RawValue::Int(75001)),
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_predictions_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let service = Arc::new(PredictionService::new(CountingLoader {
            loads: Arc::clone(&loads),
            failures: 0,
            output: 42000.0,
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.predict(&request()).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42000.0);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(service.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_is_retried_by_the_next_request() {
        let loads = Arc::new(AtomicUsize::new(0));
        let service = PredictionService::new(CountingLoader {
            loads: Arc::clone(&loads),
            failures: 1,
            output: 30000.0,
        });

        let err = service.predict(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::LoadFailed { .. }));
        assert!(!service.is_loaded());

        assert_eq!(service.predict(&request()).await.unwrap(), 30000.0);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn negative_or_nan_output_is_rejected() {
        for output in [-1.0, f64::NAN] {
            let service = PredictionService::new(CountingLoader {
                loads: Arc::new(AtomicUsize::new(0)),
                failures: 0,
                output,
            });
            let err = service.predict(&request()).await.unwrap_err();
            assert!(matches!(err, InferenceError::InvalidOutput(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_with_its_path() {
        let service = PredictionService::from_artifact("/nonexistent/salary_model.json");
        match service.predict(&request()).await.unwrap_err() {
            InferenceError::ArtifactMissing(path) => {
                assert!(path.ends_with("salary_model.json"));
            }
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let path = std::env::temp_dir().join(format!("jobmarket-model-{}.pkl", std::process::id()));
        std::fs::write(&path, b"\x80\x04").unwrap();
        let err = ArtifactLoader::new(&path).load().unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, InferenceError::UnsupportedFormat(_)));
    }

    #[test]
    fn salaries_are_presented_with_two_decimals() {
        assert_eq!(round_salary(41234.5678), 41234.57);
        assert_eq!(round_salary(30000.0), 30000.0);
    }
}
