use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sku::{Reference, SkuKey};

/// Types of stock transactions.
///
/// Direction is encoded by the type, never by the sign of `quantity`; the one
/// exception is `Adjustment`, which carries an explicit signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Receipt,
    Issue,
    TransferOut,
    TransferIn,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receipt => "receipt",
            TransactionType::Issue => "issue",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(TransactionType::Receipt),
            "issue" => Some(TransactionType::Issue),
            "transfer_out" => Some(TransactionType::TransferOut),
            "transfer_in" => Some(TransactionType::TransferIn),
            "adjustment" => Some(TransactionType::Adjustment),
            _ => None,
        }
    }

    /// Effect on on-hand quantity per unit: +1 inbound, -1 outbound,
    /// 0 for adjustments (which carry their own sign).
    pub fn direction(&self) -> i64 {
        match self {
            TransactionType::Receipt | TransactionType::TransferIn => 1,
            TransactionType::Issue | TransactionType::TransferOut => -1,
            TransactionType::Adjustment => 0,
        }
    }
}

/// A stock-affecting event to be appended to the log.
///
/// For every type except `Adjustment`, `quantity` must be strictly positive.
/// For `Adjustment`, `quantity` is the signed delta and must be non-zero; the
/// recorded transaction stores its absolute value and keeps the sign in
/// `delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub key: SkuKey,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<Reference>,
}

impl NewTransaction {
    pub fn new(key: SkuKey, transaction_type: TransactionType, quantity: i64) -> Self {
        Self {
            key,
            transaction_type,
            quantity,
            unit_cost: None,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Signed effect on on-hand quantity.
    pub fn delta(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Adjustment => self.quantity,
            other => other.direction() * self.quantity,
        }
    }
}

/// Immutable record in the append-only transaction log.
///
/// `quantity` is always positive; `delta` carries the signed effect on
/// on-hand, and `on_hand_after` snapshots the projected balance at append
/// time. Records are never edited; corrections are new compensating records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub key: SkuKey,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub delta: i64,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<Reference>,
    pub occurred_at: DateTime<Utc>,
    pub on_hand_after: i64,
}
