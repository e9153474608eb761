use thiserror::Error;

use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Errors surfaced by traceability operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Product not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TraceError {
    /// Failures the simulated chain may paper over
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TraceError::NotFound | TraceError::Storage(_))
    }
}
