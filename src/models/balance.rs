use serde::{Deserialize, Serialize};

use super::transaction::{NewTransaction, StockTransaction};
use crate::errors::ServiceError;

/// Projected balance of one SKU.
///
/// `on_hand` is maintained by folding the transaction log; `reserved` is the
/// sum of active reservation claims. Both stay non-negative at all times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub on_hand: i64,
    pub reserved: i64,
}

impl StockBalance {
    /// Quantity that can be newly claimed: on-hand minus active reservations.
    ///
    /// Clamped at zero because direct issues do not consult reservations, so
    /// an over-reserved SKU can momentarily hold reserved > on-hand.
    pub fn available(&self) -> i64 {
        (self.on_hand - self.reserved).max(0)
    }

    /// Pure projection step: applies one pending transaction and returns the
    /// resulting balance, rejecting anything that would drive on-hand
    /// negative. Reservations are claims, not transactions, so `reserved`
    /// passes through unchanged.
    pub fn project(&self, txn: &NewTransaction) -> Result<StockBalance, ServiceError> {
        let new_on_hand = self.on_hand + txn.delta();
        if new_on_hand < 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "{} of {} would leave on-hand at {} (currently {})",
                txn.transaction_type.as_str(),
                txn.quantity.abs(),
                new_on_hand,
                self.on_hand
            )));
        }
        Ok(StockBalance {
            on_hand: new_on_hand,
            reserved: self.reserved,
        })
    }

    /// Recomputes on-hand by folding a full SKU log from zero. Used to check
    /// that the incrementally maintained balance never diverges from the log.
    pub fn replay(log: &[StockTransaction]) -> i64 {
        log.iter().fold(0i64, |on_hand, txn| on_hand + txn.delta)
    }
}
