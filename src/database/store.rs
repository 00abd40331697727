use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::database::model::Model;
use crate::database::query_builder::Query;
use crate::database::record::{Record, RecordError};
use crate::database::validation::ValidationErrors;
use crate::filter::FilterError;
use crate::types::Operation;

/// Errors raised by a backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<ValidationErrors> for StoreError {
    fn from(errors: ValidationErrors) -> Self {
        StoreError::Validation(errors)
    }
}

/// ORM-like contract over exactly one table. Every method is a single
/// request/response against the underlying storage; there is no staging
/// or transaction wrapper beyond what the storage does per call.
#[async_trait]
pub trait Store: Send + Sync {
    fn model(&self) -> &Model;

    async fn find(&self, id: i64) -> Result<Option<Record>, StoreError>;

    /// Matching rows in query order (default `id ASC`), after offset/limit
    async fn select(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Number of rows matching the where part of `query`
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// One value per requested column for each selected row
    async fn pluck(&self, query: &Query, columns: &[String]) -> Result<Vec<Vec<Value>>, StoreError>;

    /// Validate and insert; fails with `StoreError::Validation`
    async fn insert(&self, attributes: Map<String, Value>) -> Result<Record, StoreError>;

    /// Validate and update one row; `Ok(None)` when the id does not exist
    async fn update(&self, id: i64, attributes: Map<String, Value>) -> Result<Option<Record>, StoreError>;

    /// Unchecked bulk update of every row matching the where part; returns rows updated
    async fn update_all(&self, query: &Query, attributes: Map<String, Value>) -> Result<u64, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Delete every row matching the where part; returns rows removed
    async fn delete_all(&self, query: &Query) -> Result<u64, StoreError>;
}

/// Reject columns the model does not know about
pub(crate) fn check_columns<'a, I>(model: &Model, columns: I) -> Result<(), StoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    match model.unknown_column(columns) {
        Some(column) => Err(StoreError::UnknownColumn { table: model.table().to_string(), column }),
        None => Ok(()),
    }
}

/// Query logging and slow-operation warnings, driven by `database` config
pub(crate) fn log_operation(operation: Operation, table: &str, started: Instant, detail: &str) {
    let config = &crate::config::CONFIG.database;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if config.enable_slow_query_warning && elapsed_ms >= config.slow_query_threshold_ms {
        tracing::warn!("Slow {} on '{}' took {}ms: {}", operation, table, elapsed_ms, detail);
    } else if config.enable_query_logging {
        tracing::debug!("{} on '{}' ({}ms): {}", operation, table, elapsed_ms, detail);
    }
}
