//! jobmarket-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from `.env` and environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Create the lazy connection pools for both stores.
//! 4. Prepare the prediction service and warm the model in the background.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use jobmarket_core::store::postgres::{PgJobStore, PgMetricsStore};
use jobmarket_core::{ConnectionProvider, PredictionService};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: JOBMARKET_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "jobmarket-server starting");

    // ── 3. Stores ──────────────────────────────────────────────────────────────
    let provider = ConnectionProvider::connect_lazy(
        &cfg.jobs_database_url,
        &cfg.metrics_database_url,
        &cfg.pool_settings(),
    )?;
    info!(
        max_connections = cfg.db_max_connections,
        salary_year = cfg.salary_window.year(),
        "store pools configured"
    );

    // ── 4. Prediction model ────────────────────────────────────────────────────
    let predictor = PredictionService::from_artifact(cfg.model_path.clone());

    let state = Arc::new(AppState::new(
        cfg.clone(),
        Arc::new(PgJobStore::new(provider.clone())),
        Arc::new(PgMetricsStore::new(provider)),
        predictor,
    ));

    // A failed warm-up is retried by the first prediction request.
    let warm = Arc::clone(&state.predictor);
    let model_path = cfg.model_path.clone();
    tokio::spawn(async move {
        if let Err(e) = warm.model().await {
            warn!(path = %model_path.display(), error = %e, "model warm-up failed");
        }
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("jobmarket-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
