use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use validator::Validate;

use crate::commands::{parse_uuid, Command};
use crate::errors::ServiceError;
use crate::models::{NewTransaction, Reference, SkuKey, StockTransaction, TransactionType};
use crate::LedgerEngine;

use async_trait::async_trait;

lazy_static! {
    static ref STOCK_ISSUES: IntCounter = IntCounter::new(
        "stock_issues_total",
        "Total number of stock issues recorded"
    )
    .expect("metric can be created");
    static ref STOCK_ISSUE_FAILURES: IntCounter = IntCounter::new(
        "stock_issue_failures_total",
        "Total number of rejected stock issues"
    )
    .expect("metric can be created");
}

/// Issues quantity out of a warehouse. Direct issues check only on-hand;
/// an issue citing a reference also consumes the matching active
/// reservation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateIssueCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "Warehouse ID cannot be empty"))]
    pub warehouse_id: String,

    pub lot_id: Option<String>,

    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,

    pub reference_type: Option<String>,

    pub reference_id: Option<String>,
}

#[async_trait]
impl Command for CreateIssueCommand {
    type Result = StockTransaction;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            STOCK_ISSUE_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let key = SkuKey {
            product_id: parse_uuid(&self.product_id, "product ID")?,
            warehouse_id: parse_uuid(&self.warehouse_id, "warehouse ID")?,
            lot_id: self.lot_id.clone(),
        };
        let mut new_txn = NewTransaction::new(key, TransactionType::Issue, self.quantity);
        if let (Some(reference_type), Some(reference_id)) =
            (&self.reference_type, &self.reference_id)
        {
            new_txn.reference = Some(Reference::new(
                reference_type.clone(),
                parse_uuid(reference_id, "reference ID")?,
            ));
        }

        let txn = engine.ledger.append(new_txn).await.map_err(|e| {
            STOCK_ISSUE_FAILURES.inc();
            e
        })?;
        STOCK_ISSUES.inc();
        Ok(txn)
    }
}
