use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use validator::Validate;

use crate::commands::{parse_uuid, Command};
use crate::errors::ServiceError;
use crate::models::{NewTransaction, Reference, SkuKey, StockTransaction, TransactionType};
use crate::LedgerEngine;

use super::validate_unit_cost;
use async_trait::async_trait;

lazy_static! {
    static ref STOCK_RECEIPTS: IntCounter = IntCounter::new(
        "stock_receipts_total",
        "Total number of stock receipts recorded"
    )
    .expect("metric can be created");
    static ref STOCK_RECEIPT_FAILURES: IntCounter = IntCounter::new(
        "stock_receipt_failures_total",
        "Total number of rejected stock receipts"
    )
    .expect("metric can be created");
}

/// Receives quantity into a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReceiptCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "Warehouse ID cannot be empty"))]
    pub warehouse_id: String,

    pub lot_id: Option<String>,

    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,

    #[validate(custom = "validate_unit_cost")]
    pub unit_cost: Option<Decimal>,

    pub reference_type: Option<String>,

    pub reference_id: Option<String>,
}

#[async_trait]
impl Command for CreateReceiptCommand {
    type Result = StockTransaction;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            STOCK_RECEIPT_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let key = SkuKey {
            product_id: parse_uuid(&self.product_id, "product ID")?,
            warehouse_id: parse_uuid(&self.warehouse_id, "warehouse ID")?,
            lot_id: self.lot_id.clone(),
        };
        let mut new_txn = NewTransaction::new(key, TransactionType::Receipt, self.quantity);
        new_txn.unit_cost = self.unit_cost;
        if let (Some(reference_type), Some(reference_id)) =
            (&self.reference_type, &self.reference_id)
        {
            new_txn.reference = Some(Reference::new(
                reference_type.clone(),
                parse_uuid(reference_id, "reference ID")?,
            ));
        }

        let txn = engine.ledger.append(new_txn).await.map_err(|e| {
            STOCK_RECEIPT_FAILURES.inc();
            e
        })?;
        STOCK_RECEIPTS.inc();
        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn zero_quantity_fails_boundary_validation() {
        let cmd = CreateReceiptCommand {
            product_id: Uuid::new_v4().to_string(),
            warehouse_id: Uuid::new_v4().to_string(),
            lot_id: None,
            quantity: 0,
            unit_cost: None,
            reference_type: None,
            reference_id: None,
        };
        assert!(cmd.validate().is_err());
    }
}
