use thiserror::Error;

use crate::database::record::RecordError;
use crate::database::store::StoreError;
use crate::database::validation::ValidationErrors;
use crate::dto::DtoError;
use crate::filter::FilterError;

/// Errors surfaced by a `PublicApi` gateway.
///
/// `Validation` and `NotFound` are the assertive (`*_strict`) outcomes; the
/// sentinel variants of each operation report them as `None`/`false` instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Dto(#[from] DtoError),

    #[error(transparent)]
    Store(StoreError),
}

impl GatewayError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    /// Field-level messages when this is a validation failure
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            GatewayError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => GatewayError::Validation(errors),
            StoreError::Filter(e) => GatewayError::InvalidInput(e.to_string()),
            StoreError::Record(e) => GatewayError::InvalidInput(e.to_string()),
            other => GatewayError::Store(other),
        }
    }
}

impl From<FilterError> for GatewayError {
    fn from(err: FilterError) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}

impl From<RecordError> for GatewayError {
    fn from(err: RecordError) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}
