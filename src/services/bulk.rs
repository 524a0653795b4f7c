//! Bulk operation runner.
//!
//! A batch of up to 100 transactions is applied item by item in input order.
//! Each item succeeds or fails independently; failures are collected, never
//! thrown, and never roll back earlier successes. Oversized or empty batches
//! are rejected before any item is processed.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::errors::{BulkItemError, ServiceError};
use crate::models::NewTransaction;
use crate::services::ledger::LedgerService;

/// Per-item breakdown of a batch run. Every input index appears in exactly
/// one of `transaction_ids` or `errors`, and `created + failed` equals the
/// batch length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub created: usize,
    pub failed: usize,
    pub transaction_ids: Vec<Uuid>,
    pub errors: Vec<BulkItemError>,
}

/// Service applying batches of transactions with partial-failure reporting.
#[derive(Clone)]
pub struct BulkService {
    ledger: LedgerService,
    max_batch_size: usize,
}

impl BulkService {
    pub fn new(ledger: LedgerService, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            max_batch_size: config.max_batch_size,
        }
    }

    /// Applies a batch of transactions in input order.
    #[instrument(skip(self, transactions), fields(batch_len = transactions.len()))]
    pub async fn apply_batch(
        &self,
        transactions: Vec<NewTransaction>,
    ) -> Result<BulkOutcome, ServiceError> {
        self.apply_prepared(transactions.into_iter().map(Ok).collect())
            .await
    }

    /// Applies a batch where some items may already have failed upstream
    /// validation. Pre-failed items keep their input index in the per-item
    /// breakdown; the batch-size bound counts all items, valid or not.
    pub(crate) async fn apply_prepared(
        &self,
        items: Vec<Result<NewTransaction, ServiceError>>,
    ) -> Result<BulkOutcome, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "batch must contain at least one transaction".to_string(),
            ));
        }
        if items.len() > self.max_batch_size {
            return Err(ServiceError::ValidationError(format!(
                "batch of {} exceeds the maximum of {} transactions",
                items.len(),
                self.max_batch_size
            )));
        }

        let mut transaction_ids = Vec::new();
        let mut errors = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let result = match item {
                Ok(new_txn) => self.ledger.append(new_txn).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(txn) => transaction_ids.push(txn.id),
                Err(e) => errors.push(BulkItemError {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        let outcome = BulkOutcome {
            created: transaction_ids.len(),
            failed: errors.len(),
            transaction_ids,
            errors,
        };
        info!(
            created = outcome.created,
            failed = outcome.failed,
            "Applied bulk batch"
        );
        Ok(outcome)
    }
}
