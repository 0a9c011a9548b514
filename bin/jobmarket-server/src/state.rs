//! Shared application state injected into every Axum handler.

use std::fmt;
use std::sync::Arc;

use jobmarket_core::{JobStore, MetricsStore, PredictionService, StatisticsAggregator};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Job postings store.
    pub jobs: Arc<dyn JobStore>,
    /// Model-evaluation history store.
    pub metrics: Arc<dyn MetricsStore>,
    pub aggregator: StatisticsAggregator,
    /// Lazily loaded salary model.
    pub predictor: Arc<PredictionService>,
}

impl AppState {
    pub fn new(
        config: Config,
        jobs: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricsStore>,
        predictor: PredictionService,
    ) -> Self {
        let aggregator = StatisticsAggregator::new(Arc::clone(&jobs), config.salary_window);
        Self {
            config: Arc::new(config),
            jobs,
            metrics,
            aggregator,
            predictor: Arc::new(predictor),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("predictor", &self.predictor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! State over in-memory stores for handler tests.

    use super::*;
    use jobmarket_core::predict::ModelLoader;
    use jobmarket_core::store::memory::{MemoryJobStore, MemoryMetricsStore};
    use jobmarket_core::{InferenceError, JobPosting, SalaryModel};
    use chrono::NaiveDate;

    /// Hands out an already-built model.
    pub struct Preloaded(pub Arc<dyn SalaryModel>);

    impl ModelLoader for Preloaded {
        fn load(&self) -> Result<Arc<dyn SalaryModel>, InferenceError> {
            Ok(Arc::clone(&self.0))
        }
    }

    pub fn config() -> Config {
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/jobs".into()),
            "DATABASE_URL2" => Some("postgres://localhost/metrics".into()),
            "JOBMARKET_MODEL_PATH" => Some("/nonexistent/salary_prediction_model.json".into()),
            _ => None,
        })
        .unwrap()
    }

    pub fn state(
        jobs: MemoryJobStore,
        metrics: MemoryMetricsStore,
        predictor: PredictionService,
    ) -> Arc<AppState> {
        Arc::new(AppState::new(
            config(),
            Arc::new(jobs),
            Arc::new(metrics),
            predictor,
        ))
    }

    /// Empty stores and a model path that does not exist.
    pub fn empty_state() -> Arc<AppState> {
        let cfg = config();
        let predictor = PredictionService::from_artifact(cfg.model_path.clone());
        state(
            MemoryJobStore::default(),
            MemoryMetricsStore::default(),
            predictor,
        )
    }

    pub fn posting(
        contract: &str,
        salary: Option<f64>,
        postal: &str,
        created: NaiveDate,
    ) -> JobPosting {
        JobPosting {
            rome_code: Some("M1805".into()),
            rome_label: Some("Études et développement informatique".into()),
            contract_type: Some(contract.into()),
            contract_nature: Some("Contrat travail".into()),
            experience_required: Some("E".into()),
            experience_required_months: Some(24.0),
            department: Some(postal[..2].to_owned()),
            postal_code: Some(postal.into()),
            creation_date: Some(created),
            calculated_salary: salary,
            geo_point: Some("48.85,2.35".into()),
        }
    }
}
