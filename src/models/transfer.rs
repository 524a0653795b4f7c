use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::sku::SkuKey;

/// Transfer state machine.
///
/// `Pending` transfers have no ledger footprint and may be cancelled.
/// `InTransit` means the outbound debit is recorded and the quantity is in
/// neither warehouse's balance; the transfer must then run to `Completed` or
/// `Failed` (with the debit reversed). Terminal states never change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }
}

/// A paired debit/credit moving quantity between two warehouses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub product_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub lot_id: Option<String>,
    pub quantity: i64,
    pub status: TransferStatus,
    pub outbound_transaction_id: Option<Uuid>,
    pub inbound_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn source_key(&self) -> SkuKey {
        SkuKey {
            product_id: self.product_id,
            warehouse_id: self.from_warehouse_id,
            lot_id: self.lot_id.clone(),
        }
    }

    pub fn destination_key(&self) -> SkuKey {
        SkuKey {
            product_id: self.product_id,
            warehouse_id: self.to_warehouse_id,
            lot_id: self.lot_id.clone(),
        }
    }
}
