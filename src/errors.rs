use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

/// Errors produced by the ledger engine and its services.
///
/// Validation and stock-sufficiency failures are returned to the caller
/// per-operation (and per-item for bulk batches); they are never silently
/// dropped. `TransferReversal` is the one variant that signals the ledger may
/// be inconsistent and is always logged at the highest severity before being
/// returned.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient available quantity: {0}")]
    InsufficientAvailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Reserved for optimistic-concurrency backends that detect a lost
    /// update instead of serializing on a lock. The in-memory store only
    /// ever produces `LockTimeout` as its retryable.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Transfer reversal failed: {0}")]
    TransferReversal(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ServiceError {
    /// True when the caller can safely retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Conflict(_) | ServiceError::LockTimeout(_)
        )
    }

    /// Maps `validator` derive output into a single validation error.
    pub fn from_validation_errors(errors: ValidationErrors) -> Self {
        ServiceError::ValidationError(format!("Invalid input: {}", errors))
    }
}

impl From<config::ConfigError> for ServiceError {
    fn from(err: config::ConfigError) -> Self {
        ServiceError::ConfigError(err.to_string())
    }
}

/// Per-item failure inside a bulk batch, keyed by the item's input index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkItemError {
    pub index: usize,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ServiceError::Conflict("lost the race".into()).is_retryable());
        assert!(ServiceError::LockTimeout("sku busy".into()).is_retryable());
        assert!(!ServiceError::InsufficientStock("short".into()).is_retryable());
        assert!(!ServiceError::TransferReversal("bad".into()).is_retryable());
    }

    #[test]
    fn bulk_item_error_serialization() {
        let err = BulkItemError {
            index: 1,
            error: "quantity must be positive".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"index\":1"));
        assert!(json.contains("quantity must be positive"));
    }
}
