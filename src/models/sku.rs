use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a stock-keeping unit scoped to one warehouse and, optionally,
/// one lot. Balances, logs, and reservations are all keyed by this.
///
/// The `Ord` derive gives the fixed global order used when an operation must
/// lock two SKUs at once (transfers), so opposite-direction transfers cannot
/// deadlock each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkuKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<String>,
}

impl SkuKey {
    pub fn new(product_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            product_id,
            warehouse_id,
            lot_id: None,
        }
    }

    pub fn with_lot(product_id: Uuid, warehouse_id: Uuid, lot_id: impl Into<String>) -> Self {
        Self {
            product_id,
            warehouse_id,
            lot_id: Some(lot_id.into()),
        }
    }
}

impl fmt::Display for SkuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lot_id {
            Some(lot) => write!(f, "{}@{}#{}", self.product_id, self.warehouse_id, lot),
            None => write!(f, "{}@{}", self.product_id, self.warehouse_id),
        }
    }
}

/// Link from a transaction or reservation to an external document
/// (sales order, work order, transfer, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub reference_type: String,
    pub reference_id: Uuid,
}

impl Reference {
    pub fn new(reference_type: impl Into<String>, reference_id: Uuid) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id,
        }
    }
}
