use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use validator::Validate;

use crate::commands::{parse_uuid, Command};
use crate::errors::ServiceError;
use crate::services::transfers::TransferSummary;
use crate::LedgerEngine;

use async_trait::async_trait;

lazy_static! {
    static ref INVENTORY_TRANSFERS: IntCounter = IntCounter::new(
        "inventory_transfers_total",
        "Total number of inventory transfers dispatched"
    )
    .expect("metric can be created");
    static ref INVENTORY_TRANSFER_FAILURES: IntCounter = IntCounter::new(
        "inventory_transfer_failures_total",
        "Total number of failed inventory transfers"
    )
    .expect("metric can be created");
}

/// Initiates a transfer between two warehouses and dispatches it: on success
/// the outbound debit is recorded and the transfer is in transit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTransferCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "From warehouse ID cannot be empty"))]
    pub from_warehouse_id: String,

    #[validate(length(min = 1, message = "To warehouse ID cannot be empty"))]
    pub to_warehouse_id: String,

    pub lot_id: Option<String>,

    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
}

#[async_trait]
impl Command for CreateTransferCommand {
    type Result = TransferSummary;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            INVENTORY_TRANSFER_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let product_id = parse_uuid(&self.product_id, "product ID")?;
        let from_warehouse_id = parse_uuid(&self.from_warehouse_id, "from warehouse ID")?;
        let to_warehouse_id = parse_uuid(&self.to_warehouse_id, "to warehouse ID")?;

        if from_warehouse_id == to_warehouse_id {
            INVENTORY_TRANSFER_FAILURES.inc();
            let msg = "Cannot transfer inventory to the same warehouse".to_string();
            error!("{}", msg);
            return Err(ServiceError::ValidationError(msg));
        }

        let pending = engine
            .transfers
            .initiate(
                product_id,
                from_warehouse_id,
                to_warehouse_id,
                self.lot_id.clone(),
                self.quantity,
            )
            .await
            .map_err(|e| {
                INVENTORY_TRANSFER_FAILURES.inc();
                e
            })?;

        let dispatched = engine.transfers.dispatch(pending.id).await.map_err(|e| {
            INVENTORY_TRANSFER_FAILURES.inc();
            e
        })?;
        INVENTORY_TRANSFERS.inc();
        Ok(dispatched)
    }
}

/// Completes an in-transit transfer, crediting the destination or reversing
/// the debit when the destination rejects it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteTransferCommand {
    #[validate(length(min = 1, message = "Transfer ID cannot be empty"))]
    pub transfer_id: String,
}

#[async_trait]
impl Command for CompleteTransferCommand {
    type Result = TransferSummary;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ServiceError::ValidationError(format!("Invalid input: {}", e))
        })?;
        let transfer_id = parse_uuid(&self.transfer_id, "transfer ID")?;
        engine.transfers.complete(transfer_id).await
    }
}
