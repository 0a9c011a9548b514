//! Serving core for the job-market API.
//!
//! Two independent stores feed this crate: Store A holds job postings and
//! their reference tables, Store B holds the evaluation history of the
//! salary model. On top of them sit:
//!
//! - [`stats::StatisticsAggregator`], which fans out a fixed battery of
//!   aggregate queries and folds them into a [`stats::StatisticsSnapshot`];
//! - [`metrics`], which streams the model-evaluation history;
//! - [`features::normalize`], the parse-and-validate boundary for
//!   prediction inputs;
//! - [`predict::PredictionService`], which feeds one normalized row to the
//!   lazily loaded model artifact.

pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod predict;
pub mod provider;
pub mod stats;
pub mod store;

pub use error::{InferenceError, StoreError, ValidationError};
pub use features::{PredictionRequest, RawPredictionInput, RawValue, normalize};
pub use models::{JobPosting, MetricRecord};
pub use predict::{PredictionService, SalaryModel};
pub use provider::{ConnectionProvider, PoolSettings, StoreId};
pub use stats::{SalaryWindow, Statistic, StatisticsAggregator, StatisticsSnapshot};
pub use store::{JobStore, MetricsStore};
