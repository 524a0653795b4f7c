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
    static ref STOCK_TRANSACTIONS: IntCounter = IntCounter::new(
        "stock_transactions_total",
        "Total number of stock transactions recorded"
    )
    .expect("metric can be created");
    static ref STOCK_TRANSACTION_FAILURES: IntCounter = IntCounter::new(
        "stock_transaction_failures_total",
        "Total number of rejected stock transactions"
    )
    .expect("metric can be created");
}

/// Generic stock transaction request: the boundary shape behind receipts,
/// issues, and adjustments. `quantity` must be positive for every type except
/// `adjustment`, where it is the signed delta.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTransactionCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "Warehouse ID cannot be empty"))]
    pub warehouse_id: String,

    pub lot_id: Option<String>,

    #[validate(length(min = 1, message = "Transaction type cannot be empty"))]
    pub transaction_type: String,

    pub quantity: i64,

    #[validate(custom = "validate_unit_cost")]
    pub unit_cost: Option<Decimal>,

    pub reference_type: Option<String>,

    pub reference_id: Option<String>,
}

impl CreateTransactionCommand {
    /// Validates the boundary constraints and converts into the core's
    /// transaction request. Nothing here touches the ledger.
    pub fn to_new_transaction(&self) -> Result<NewTransaction, ServiceError> {
        self.validate().map_err(|e| {
            ServiceError::ValidationError(format!("Invalid input: {}", e))
        })?;

        let transaction_type = TransactionType::from_str(&self.transaction_type).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Unknown transaction type: {}",
                self.transaction_type
            ))
        })?;

        match transaction_type {
            TransactionType::Adjustment => {
                if self.quantity == 0 {
                    return Err(ServiceError::ValidationError(
                        "adjustment delta must be non-zero".to_string(),
                    ));
                }
            }
            _ => {
                if self.quantity <= 0 {
                    return Err(ServiceError::ValidationError(
                        "quantity must be positive".to_string(),
                    ));
                }
            }
        }

        let product_id = parse_uuid(&self.product_id, "product ID")?;
        let warehouse_id = parse_uuid(&self.warehouse_id, "warehouse ID")?;
        let key = SkuKey {
            product_id,
            warehouse_id,
            lot_id: self.lot_id.clone(),
        };

        let reference = match (&self.reference_type, &self.reference_id) {
            (Some(reference_type), Some(reference_id)) => Some(Reference::new(
                reference_type.clone(),
                parse_uuid(reference_id, "reference ID")?,
            )),
            (None, None) => None,
            _ => {
                return Err(ServiceError::ValidationError(
                    "reference_type and reference_id must be provided together".to_string(),
                ));
            }
        };

        let mut new_txn = NewTransaction::new(key, transaction_type, self.quantity);
        new_txn.unit_cost = self.unit_cost;
        new_txn.reference = reference;
        Ok(new_txn)
    }
}

#[async_trait]
impl Command for CreateTransactionCommand {
    type Result = StockTransaction;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        let new_txn = self.to_new_transaction().map_err(|e| {
            STOCK_TRANSACTION_FAILURES.inc();
            error!("{}", e);
            e
        })?;

        let txn = engine.ledger.append(new_txn).await.map_err(|e| {
            STOCK_TRANSACTION_FAILURES.inc();
            e
        })?;
        STOCK_TRANSACTIONS.inc();
        Ok(txn)
    }
}
