//! Postgres-backed stores.
//!
//! Queries go through the runtime-checked `sqlx::query*` functions so no
//! database is needed at compile time. Every aggregate is cast to `float8`
//! in SQL; rounding and typing of the published values happens in
//! [`crate::stats`].

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{JobStore, MetricsStore, MetricsStream};
use crate::error::StoreError;
use crate::models::{JobPosting, MetricRecord};
use crate::provider::{ConnectionProvider, StoreId};
use crate::stats::{SalaryWindow, Statistic, TopSalary};

const METRICS_CHANNEL_CAPACITY: usize = 64;

const POSTINGS_SQL: &str = "\
    SELECT B.rome_code, A.rome_label, A.contract_type, A.contract_nature, \
           A.experience_required, \
           A.experience_required_months::float8 AS experience_required_months, \
           COALESCE(C.departement, LEFT(A.code_postal, 2)) AS department, \
           A.code_postal AS postal_code, \
           A.date_creation::date AS creation_date, \
           A.calculated_salary::float8 AS calculated_salary, \
           A.geo_point \
    FROM jm_job A \
    LEFT JOIN jm_rome B ON A.rome_label = B.rome_label \
    LEFT JOIN jm_code_postaux C ON A.code_postal = C.code_postal";

const TOP_SALARY_SQL: &str = "\
    SELECT A.calculated_salary::float8 AS salary, \
           COALESCE(C.departement, LEFT(A.code_postal, 2)) AS department \
    FROM jm_job A \
    LEFT JOIN jm_code_postaux C ON A.code_postal = C.code_postal \
    WHERE A.calculated_salary IS NOT NULL \
    ORDER BY A.calculated_salary DESC \
    LIMIT 1";

const METRICS_HISTORY_SQL: &str = "\
    SELECT id::int8 AS id, evaluation_date::date AS evaluation_date, \
           mse::float8 AS mse, rmse::float8 AS rmse, r2::float8 AS r2, mae::float8 AS mae \
    FROM metrics";

/// SQL behind each primary statistic. Only `MeanSalary` takes parameters
/// (`$1` and `$2`, the window bounds).
fn statistic_sql(stat: Statistic) -> &'static str {
    match stat {
        Statistic::PctCdi => {
            "SELECT (100.0 * COUNT(*) FILTER (WHERE contract_type = 'CDI') \
                     / NULLIF(COUNT(*), 0))::float8 FROM jm_job"
        }
        Statistic::PctApprenticeship => {
            "SELECT (100.0 * COUNT(*) FILTER (WHERE contract_nature ILIKE '%apprentissage%') \
                     / NULLIF(COUNT(*), 0))::float8 FROM jm_job"
        }
        Statistic::PctExperienceRequired => {
            "SELECT (100.0 * COUNT(*) FILTER (WHERE experience_required = 'E') \
                     / NULLIF(COUNT(*), 0))::float8 FROM jm_job"
        }
        Statistic::MedianExperienceMonths => {
            "SELECT (PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY experience_required_months))::float8 \
             FROM jm_job WHERE experience_required_months IS NOT NULL"
        }
        Statistic::PctNoExperience => {
            "SELECT (100.0 * COUNT(*) FILTER (WHERE experience_required = 'D') \
                     / NULLIF(COUNT(*), 0))::float8 FROM jm_job"
        }
        Statistic::MeanSalary => {
            "SELECT AVG(calculated_salary)::float8 FROM jm_job \
             WHERE calculated_salary IS NOT NULL \
               AND date_creation >= $1 AND date_creation < $2"
        }
        Statistic::TotalOffers => "SELECT COUNT(*)::float8 FROM jm_job",
        Statistic::NewOffersToday => {
            "SELECT COUNT(*)::float8 FROM jm_job WHERE date_creation::date = CURRENT_DATE"
        }
    }
}

/// Store A over Postgres.
#[derive(Clone, Debug)]
pub struct PgJobStore {
    provider: ConnectionProvider,
}

impl PgJobStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn fetch_statistics(
        &self,
        stats: &[Statistic],
        window: SalaryWindow,
    ) -> Result<Vec<(Statistic, Result<Option<f64>, StoreError>)>, StoreError> {
        let mut handle = self.provider.acquire(StoreId::Jobs).await?;
        let mut results = Vec::with_capacity(stats.len());
        for &stat in stats {
            let mut query = sqlx::query_scalar::<_, Option<f64>>(statistic_sql(stat));
            if stat == Statistic::MeanSalary {
                query = query.bind(window.start).bind(window.end);
            }
            let value = query
                .fetch_one(&mut *handle)
                .await
                .map_err(|e| StoreError::from_sqlx(StoreId::Jobs, stat.name(), e));
            debug!(statistic = stat.name(), ?value, "statistic fetched");
            let lost_connection = matches!(&value, Err(e) if e.is_connection());
            results.push((stat, value));
            if lost_connection {
                break;
            }
        }
        Ok(results)
    }

    async fn fetch_top_salary(&self) -> Result<Option<TopSalary>, StoreError> {
        let mut handle = self.provider.acquire(StoreId::Jobs).await?;
        sqlx::query_as::<_, TopSalary>(TOP_SALARY_SQL)
            .fetch_optional(&mut *handle)
            .await
            .map_err(|e| StoreError::from_sqlx(StoreId::Jobs, "top_salary", e))
    }

    async fn list_postings(&self) -> Result<Vec<JobPosting>, StoreError> {
        let mut handle = self.provider.acquire(StoreId::Jobs).await?;
        let postings = sqlx::query_as::<_, JobPosting>(POSTINGS_SQL)
            .fetch_all(&mut *handle)
            .await
            .map_err(|e| StoreError::from_sqlx(StoreId::Jobs, "list_postings", e))?;
        debug!(rows = postings.len(), "postings listed");
        Ok(postings)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.provider.ping(StoreId::Jobs).await
    }
}

/// Store B over Postgres.
#[derive(Clone, Debug)]
pub struct PgMetricsStore {
    provider: ConnectionProvider,
}

impl PgMetricsStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    async fn read_metrics_history(&self) -> Result<MetricsStream, StoreError> {
        let mut handle = self.provider.acquire(StoreId::Metrics).await?;
        let (tx, rx) = mpsc::channel(METRICS_CHANNEL_CAPACITY);

        // The task owns the handle, so it goes back to the pool once the
        // table is drained or the consumer drops the stream.
        tokio::spawn(async move {
            let mut rows = sqlx::query_as::<_, MetricRecord>(METRICS_HISTORY_SQL).fetch(&mut *handle);
            while let Some(row) = rows.next().await {
                let item = row
                    .map_err(|e| StoreError::from_sqlx(StoreId::Metrics, "metrics_history", e));
                if tx.send(item).await.is_err() {
                    warn!("metrics history consumer went away before the end of the table");
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.provider.ping(StoreId::Metrics).await
    }
}
