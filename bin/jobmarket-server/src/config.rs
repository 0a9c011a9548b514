//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use jobmarket_core::{PoolSettings, SalaryWindow};

/// Runtime configuration for jobmarket-server.
///
/// Everything except the two store connection strings has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Postgres URL of the job postings store.
    pub jobs_database_url: String,

    /// Postgres URL of the model metrics store.
    pub metrics_database_url: String,

    /// Trained model artifact (`.json`, or `.onnx` with the `onnx` feature).
    pub model_path: PathBuf,

    /// Calendar year the mean salary is computed over
    /// (`JOBMARKET_SALARY_YEAR`, default 2024).
    pub salary_window: SalaryWindow,

    /// Pool size per store.
    pub db_max_connections: u32,

    pub db_acquire_timeout: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from the process environment, after loading `.env`
    /// if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env file is the normal case in containers.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jobs_database_url = var("JOBMARKET_JOBS_DATABASE_URL")
            .or_else(|| var("DATABASE_URL"))
            .context("JOBMARKET_JOBS_DATABASE_URL (or DATABASE_URL) must be set")?;
        let metrics_database_url = var("JOBMARKET_METRICS_DATABASE_URL")
            .or_else(|| var("DATABASE_URL2"))
            .context("JOBMARKET_METRICS_DATABASE_URL (or DATABASE_URL2) must be set")?;

        let salary_year = parse_or(var("JOBMARKET_SALARY_YEAR"), 2024);
        let salary_window = SalaryWindow::calendar_year(salary_year)
            .with_context(|| format!("JOBMARKET_SALARY_YEAR={salary_year} is out of range"))?;

        Ok(Self {
            bind_address: var("JOBMARKET_BIND").unwrap_or_else(|| "0.0.0.0:8000".to_owned()),
            jobs_database_url,
            metrics_database_url,
            model_path: var("JOBMARKET_MODEL_PATH")
                .unwrap_or_else(|| "salary_prediction_model.json".to_owned())
                .into(),
            salary_window,
            db_max_connections: parse_or(var("JOBMARKET_DB_MAX_CONNECTIONS"), 5),
            db_acquire_timeout: Duration::from_secs(parse_or(
                var("JOBMARKET_DB_ACQUIRE_TIMEOUT_SECS"),
                5,
            )),
            log_level: var("JOBMARKET_LOG").unwrap_or_else(|| "info".to_owned()),
            log_json: var("JOBMARKET_LOG_JSON").is_some_and(|v| is_truthy(&v)),
            cors_allowed_origins: var("JOBMARKET_CORS_ORIGINS"),
            enable_swagger: var("JOBMARKET_ENABLE_SWAGGER").is_none_or(|v| is_truthy(&v)),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            acquire_timeout: self.db_acquire_timeout,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
