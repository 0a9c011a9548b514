//! Error taxonomy shared by every component of the serving core.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::StoreId;

/// Failures talking to one of the two stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable, the pool is exhausted or closed, or the
    /// credentials were rejected. Fatal for the request; never retried here.
    #[error("{store} store unavailable: {message}")]
    Connection { store: StoreId, message: String },

    /// A single query was malformed, timed out server-side, or returned rows
    /// that could not be decoded.
    #[error("query `{query}` failed: {message}")]
    Query { query: String, message: String },
}

impl StoreError {
    /// Classify a sqlx error raised while running `query` against `store`.
    pub fn from_sqlx(store: StoreId, query: &str, err: sqlx::Error) -> Self {
        if is_connection_failure(&err) {
            StoreError::Connection {
                store,
                message: err.to_string(),
            }
        } else {
            StoreError::Query {
                query: query.to_owned(),
                message: err.to_string(),
            }
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }
}

fn is_connection_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::Protocol(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            // SQLSTATE class 08 is "connection exception", 28 is
            // "invalid authorization specification".
            .map(|code| code.starts_with("08") || code.starts_with("28"))
            .unwrap_or(false),
        _ => false,
    }
}

/// A required prediction field was missing or left on the "unselected"
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field `{0}` is missing")]
    Missing(&'static str),

    #[error("required field `{0}` was left unselected")]
    Unselected(&'static str),
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(f) | ValidationError::Unselected(f) => f,
        }
    }
}

/// Anything that prevents the model artifact from producing a prediction.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("model artifact not found at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("failed to load model artifact {}: {message}", .path.display())]
    LoadFailed { path: PathBuf, message: String },

    #[error("unsupported model artifact format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("model rejected the input schema: {0}")]
    SchemaMismatch(String),

    #[error("model produced an invalid prediction: {0}")]
    InvalidOutput(f64),

    #[error("inference runtime error: {0}")]
    Runtime(String),
}
