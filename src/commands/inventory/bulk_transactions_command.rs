use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use validator::Validate;

use crate::commands::Command;
use crate::errors::ServiceError;
use crate::services::bulk::BulkOutcome;
use crate::LedgerEngine;

use super::CreateTransactionCommand;
use async_trait::async_trait;

lazy_static! {
    static ref BULK_BATCHES: IntCounter = IntCounter::new(
        "bulk_batches_total",
        "Total number of bulk transaction batches processed"
    )
    .expect("metric can be created");
    static ref BULK_BATCH_REJECTIONS: IntCounter = IntCounter::new(
        "bulk_batch_rejections_total",
        "Total number of bulk batches rejected before processing"
    )
    .expect("metric can be created");
}

/// Applies up to 100 transactions as one batch. Item validation failures are
/// reported per index in the outcome; only an empty or oversized batch is
/// rejected outright, before any item runs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkTransactionsCommand {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Batch must contain between 1 and 100 transactions"
    ))]
    pub transactions: Vec<CreateTransactionCommand>,
}

#[async_trait]
impl Command for BulkTransactionsCommand {
    type Result = BulkOutcome;

    #[instrument(skip(self, engine), fields(batch_len = self.transactions.len()))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            BULK_BATCH_REJECTIONS.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        // Per-item boundary validation happens here so an invalid item keeps
        // its index in the outcome instead of failing the whole batch.
        let items = self
            .transactions
            .iter()
            .map(|item| item.to_new_transaction())
            .collect();

        let outcome = engine.bulk.apply_prepared(items).await.map_err(|e| {
            BULK_BATCH_REJECTIONS.inc();
            e
        })?;
        BULK_BATCHES.inc();
        Ok(outcome)
    }
}
