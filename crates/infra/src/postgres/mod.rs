//! Postgres adapter for the stock core.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `PgStoreError` |
//! |------------|---------------|----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key / check violation) | `23503`, `23514` | `Constraint` |
//! | Database (serialization failure, deadlock) | `40001`, `40P01` | `Retryable` |
//! | Database (other) | any other | `Query` |
//! | PoolClosed, PoolTimedOut, Io | n/a | `Unavailable` |
//! | Other | n/a | `Query` |
//!
//! Everything except `Conflict` surfaces to callers as `DomainError::Internal`:
//! the transaction was rolled back and nothing was committed.

pub mod schema;
pub mod stock;

pub use schema::{SCHEMA, ensure_schema};
pub use stock::PgStockStore;

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use depot_core::DomainError;

use crate::config::DatabaseConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PgStoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("transaction aborted, retry: {0}")]
    Retryable(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl From<PgStoreError> for DomainError {
    fn from(value: PgStoreError) -> Self {
        match value {
            PgStoreError::Conflict(msg) => DomainError::Conflict(msg),
            other => DomainError::Internal(other.to_string()),
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> PgStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => PgStoreError::Conflict(msg),
                Some("23503") | Some("23514") => PgStoreError::Constraint(msg),
                Some("40001") | Some("40P01") => PgStoreError::Retryable(msg),
                _ => PgStoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed => PgStoreError::Unavailable(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => PgStoreError::Unavailable(format!("pool timed out in {operation}")),
        sqlx::Error::Io(e) => PgStoreError::Unavailable(format!("io error in {operation}: {e}")),
        other => PgStoreError::Query(format!("sqlx error in {operation}: {other}")),
    }
}

/// Open a pool sized from `config`.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .context("connecting to postgres")?;
    info!(max_connections = config.max_connections, "postgres pool ready");
    Ok(pool)
}
