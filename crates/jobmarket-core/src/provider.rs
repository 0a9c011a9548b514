//! Connection provider for the two independent stores.
//!
//! Both pools are created lazily: nothing touches the network until the first
//! [`ConnectionProvider::acquire`], so the server can start while a store is
//! down and report the outage per request instead.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use strum::Display;
use tracing::debug;

use crate::error::StoreError;

/// A pooled connection; dropping it returns the connection to its pool.
pub type ScopedHandle = PoolConnection<sqlx::Postgres>;

/// Which of the two stores a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreId {
    /// Store A: job postings and reference tables.
    Jobs,
    /// Store B: model-evaluation history.
    Metrics,
}

/// Pool sizing shared by both stores.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionProvider {
    jobs: PgPool,
    metrics: PgPool,
}

impl ConnectionProvider {
    /// Build both pools from their connection strings.
    ///
    /// Only the URLs are validated here; a malformed URL is reported as a
    /// connection error for the store it belongs to.
    pub fn connect_lazy(
        jobs_url: &str,
        metrics_url: &str,
        settings: &PoolSettings,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            jobs: lazy_pool(StoreId::Jobs, jobs_url, settings)?,
            metrics: lazy_pool(StoreId::Metrics, metrics_url, settings)?,
        })
    }

    pub fn pool(&self, store: StoreId) -> &PgPool {
        match store {
            StoreId::Jobs => &self.jobs,
            StoreId::Metrics => &self.metrics,
        }
    }

    /// Check a connection out of `store`'s pool.
    pub async fn acquire(&self, store: StoreId) -> Result<ScopedHandle, StoreError> {
        let handle = self
            .pool(store)
            .acquire()
            .await
            .map_err(|e| StoreError::Connection {
                store,
                message: e.to_string(),
            })?;
        debug!(%store, "store handle acquired");
        Ok(handle)
    }

    /// One trivial round trip, used by the health endpoint.
    pub async fn ping(&self, store: StoreId) -> Result<(), StoreError> {
        let mut handle = self.acquire(store).await?;
        sqlx::query("SELECT 1")
            .execute(&mut *handle)
            .await
            .map_err(|e| StoreError::from_sqlx(store, "ping", e))?;
        Ok(())
    }
}

fn lazy_pool(store: StoreId, url: &str, settings: &PoolSettings) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_lazy(url)
        .map_err(|e| StoreError::Connection {
            store,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_reported_against_its_store() {
        let err = ConnectionProvider::connect_lazy(
            "postgres://localhost/jobs",
            "definitely not a url",
            &PoolSettings::default(),
        )
        .unwrap_err();
        match err {
            StoreError::Connection { store, .. } => assert_eq!(store, StoreId::Metrics),
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_store_fails_on_acquire() {
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
        };
        let provider = ConnectionProvider::connect_lazy(
            "postgres://nobody@127.0.0.1:1/jobs",
            "postgres://nobody@127.0.0.1:1/metrics",
            &settings,
        )
        .expect("lazy pools never connect eagerly");

        let err = provider.acquire(StoreId::Jobs).await.unwrap_err();
        assert!(err.is_connection(), "got {err:?}");

        let err = provider.ping(StoreId::Metrics).await.unwrap_err();
        assert!(err.is_connection(), "got {err:?}");
    }

    #[test]
    fn store_ids_display_lowercase() {
        assert_eq!(StoreId::Jobs.to_string(), "jobs");
        assert_eq!(StoreId::Metrics.to_string(), "metrics");
    }
}
