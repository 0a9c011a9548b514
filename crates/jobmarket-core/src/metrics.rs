//! Model-evaluation history from Store B.

use std::cmp::Ordering;

use futures::TryStreamExt;
use tracing::debug;

use crate::error::StoreError;
use crate::models::MetricRecord;
use crate::store::{MetricsStore, MetricsStream};

/// Open the full, unfiltered history as a single-pass stream in
/// store-native order. An empty table is an empty stream.
pub async fn read_metrics_history(store: &dyn MetricsStore) -> Result<MetricsStream, StoreError> {
    store.read_metrics_history().await
}

/// Drain the history into memory, keeping store-native order.
pub async fn collect_metrics_history(
    store: &dyn MetricsStore,
) -> Result<Vec<MetricRecord>, StoreError> {
    let records: Vec<MetricRecord> = read_metrics_history(store).await?.try_collect().await?;
    debug!(rows = records.len(), "metrics history read");
    Ok(records)
}

/// Newest first: by evaluation date, then by surrogate id.
fn recency(a: &MetricRecord, b: &MetricRecord) -> Ordering {
    a.evaluation_date
        .cmp(&b.evaluation_date)
        .then_with(|| a.id.cmp(&b.id))
}

/// The latest evaluation. Several runs on the same date resolve to the one
/// with the highest id.
pub fn latest_metric(records: &[MetricRecord]) -> Option<&MetricRecord> {
    records.iter().max_by(|a, b| recency(a, b))
}
