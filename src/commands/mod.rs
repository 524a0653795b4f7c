use crate::errors::ServiceError;
use crate::LedgerEngine;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Command trait for implementing the Command Pattern
///
/// Encapsulates one validated business operation: a command checks its own
/// input at the boundary, then drives the engine's services. Nothing reaches
/// the ledger core until validation has passed.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command against the engine.
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError>;
}

pub mod inventory;

/// Parses a UUID field, mapping failures to a validation error naming the
/// field.
pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(value)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid {} format: {}", field, e)))
}
