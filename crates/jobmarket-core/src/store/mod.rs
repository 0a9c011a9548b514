//! Store access seams.
//!
//! [`JobStore`] covers everything the serving layer reads from Store A and
//! [`MetricsStore`] everything it reads from Store B. The Postgres
//! implementations live in [`postgres`]; [`memory`] holds in-process
//! stand-ins with failure injection for tests and local runs.
//!
//! The traits go through `async-trait` so the application state can hold
//! them as `Arc<dyn …>` and swap implementations without touching handlers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreError;
use crate::models::{JobPosting, MetricRecord};
use crate::stats::{SalaryWindow, Statistic, TopSalary};

/// Lazily consumed, single-pass sequence of metric rows.
pub type MetricsStream = BoxStream<'static, Result<MetricRecord, StoreError>>;

#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Run the aggregate queries behind `stats`, in order, over a single
    /// pooled handle.
    ///
    /// The outer error means no handle could be acquired. Each inner
    /// result is the raw (unrounded) value of one statistic, or `None` when
    /// the aggregate is SQL `NULL`, e.g. a mean over zero rows. A query
    /// failure does not stop the remaining statistics; a connection failure
    /// does, and is the last entry.
    async fn fetch_statistics(
        &self,
        stats: &[Statistic],
        window: SalaryWindow,
    ) -> Result<Vec<(Statistic, Result<Option<f64>, StoreError>)>, StoreError>;

    /// The highest salary together with the department of the row holding
    /// it, resolved as one joined query.
    async fn fetch_top_salary(&self) -> Result<Option<TopSalary>, StoreError>;

    /// Every posting, flattened with its reference data.
    async fn list_postings(&self) -> Result<Vec<JobPosting>, StoreError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MetricsStore: Send + Sync + 'static {
    /// Start reading the whole metrics table in store-native order.
    ///
    /// An unreachable store fails here; errors met while draining the
    /// stream are yielded as items.
    async fn read_metrics_history(&self) -> Result<MetricsStream, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
