use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use validator::Validate;

use crate::commands::{parse_uuid, Command};
use crate::errors::ServiceError;
use crate::models::{Reference, SkuKey};
use crate::services::reservations::ReservationSummary;
use crate::LedgerEngine;

use async_trait::async_trait;

lazy_static! {
    static ref RESERVATIONS_CREATED: IntCounter = IntCounter::new(
        "reservations_created_total",
        "Total number of reservations created"
    )
    .expect("metric can be created");
    static ref RESERVATION_FAILURES: IntCounter = IntCounter::new(
        "reservation_failures_total",
        "Total number of rejected reservation requests"
    )
    .expect("metric can be created");
}

/// Claims quantity against a SKU's available balance, with an expiry.
/// Omitted expiry falls back to the engine's configured default TTL.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReservationCommand {
    #[validate(length(min = 1, message = "Product ID cannot be empty"))]
    pub product_id: String,

    #[validate(length(min = 1, message = "Warehouse ID cannot be empty"))]
    pub warehouse_id: String,

    pub lot_id: Option<String>,

    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,

    #[validate(length(min = 1, message = "Reference type cannot be empty"))]
    pub reference_type: String,

    #[validate(length(min = 1, message = "Reference ID cannot be empty"))]
    pub reference_id: String,

    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl Command for CreateReservationCommand {
    type Result = ReservationSummary;

    #[instrument(skip(self, engine))]
    async fn execute(&self, engine: Arc<LedgerEngine>) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            RESERVATION_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        if let Some(expires_at) = self.expires_at {
            if expires_at <= Utc::now() {
                RESERVATION_FAILURES.inc();
                return Err(ServiceError::ValidationError(
                    "expires_at must be in the future".to_string(),
                ));
            }
        }

        let key = SkuKey {
            product_id: parse_uuid(&self.product_id, "product ID")?,
            warehouse_id: parse_uuid(&self.warehouse_id, "warehouse ID")?,
            lot_id: self.lot_id.clone(),
        };
        let reference = Reference::new(
            self.reference_type.clone(),
            parse_uuid(&self.reference_id, "reference ID")?,
        );

        let summary = engine
            .reservations
            .reserve(key, self.quantity, reference, self.expires_at)
            .await
            .map_err(|e| {
                RESERVATION_FAILURES.inc();
                e
            })?;
        RESERVATIONS_CREATED.inc();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn empty_reference_fails_boundary_validation() {
        let cmd = CreateReservationCommand {
            product_id: Uuid::new_v4().to_string(),
            warehouse_id: Uuid::new_v4().to_string(),
            lot_id: None,
            quantity: 5,
            reference_type: String::new(),
            reference_id: Uuid::new_v4().to_string(),
            expires_at: None,
        };
        assert!(cmd.validate().is_err());
    }
}
