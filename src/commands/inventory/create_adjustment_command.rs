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
    static ref STOCK_ADJUSTMENTS: IntCounter = IntCounter::new(
        "stock_adjustments_total",
        "Total number of stock adjustments recorded"
    )
    .expect("metric can be created");
    static ref STOCK_ADJUSTMENT_FAILURES: IntCounter = IntCounter::new(
        "stock_adjustment_failures_total",
        "Total number of rejected stock adjustments"
    )
    .expect("metric can be created");
}

/// Corrects a SKU's on-hand by a signed delta, as after a cycle count.
/// Unlike receipts and issues, `quantity` here may be negative; zero is
/// rejected because it would record a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAdjustmentCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "Warehouse ID cannot be empty"))]
    pub warehouse_id: String,

    pub lot_id: Option<String>,

    pub quantity: i64,

    #[validate(custom = "validate_unit_cost")]
    pub unit_cost: Option<Decimal>,

    pub reference_type: Option<String>,

    pub reference_id: Option<String>,
}

#[async_trait]
impl Command for CreateAdjustmentCommand {
    type Result = StockTransaction;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            STOCK_ADJUSTMENT_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;
        if self.quantity == 0 {
            STOCK_ADJUSTMENT_FAILURES.inc();
            return Err(ServiceError::ValidationError(
                "adjustment delta must be non-zero".to_string(),
            ));
        }

        let key = SkuKey {
            product_id: parse_uuid(&self.product_id, "product ID")?,
            warehouse_id: parse_uuid(&self.warehouse_id, "warehouse ID")?,
            lot_id: self.lot_id.clone(),
        };
        let mut new_txn = NewTransaction::new(key, TransactionType::Adjustment, self.quantity);
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
            STOCK_ADJUSTMENT_FAILURES.inc();
            e
        })?;
        STOCK_ADJUSTMENTS.inc();
        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn command(quantity: i64) -> CreateAdjustmentCommand {
        CreateAdjustmentCommand {
            product_id: Uuid::new_v4().to_string(),
            warehouse_id: Uuid::new_v4().to_string(),
            lot_id: None,
            quantity,
            unit_cost: None,
            reference_type: None,
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn zero_delta_rejected_at_the_boundary() {
        let (engine, _rx) = LedgerEngine::with_defaults();
        let result = command(0).execute(Arc::new(engine)).await;
        assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg == "adjustment delta must be non-zero");
    }

    #[tokio::test]
    async fn negative_delta_writes_down_on_hand() {
        let (engine, _rx) = LedgerEngine::with_defaults();
        let engine = Arc::new(engine);
        let up = command(10);
        let down = CreateAdjustmentCommand {
            quantity: -4,
            ..up.clone()
        };

        let first = up.execute(engine.clone()).await.unwrap();
        assert_eq!(first.on_hand_after, 10);

        let second = down.execute(engine).await.unwrap();
        assert_eq!(second.delta, -4);
        assert_eq!(second.quantity, 4);
        assert_eq!(second.on_hand_after, 6);
    }
}
