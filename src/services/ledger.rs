//! Transaction log and balance projection.
//!
//! The append-only log is the source of truth; the projected balance is
//! maintained synchronously inside the same per-SKU critical section as the
//! append, so the two can never observably diverge. Replaying a SKU's log
//! from zero always reproduces the maintained balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    NewTransaction, ReservationStatus, SkuKey, StockBalance, StockTransaction, TransactionType,
};
use crate::store::{SkuState, SkuStore};

const MAX_PAGE_LIMIT: u64 = 1000;

/// Point-in-time view of one SKU's balance for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub key: SkuKey,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    pub as_of: DateTime<Utc>,
}

/// Service owning appends to the transaction log and the projected balances.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<SkuStore>,
    event_sender: EventSender,
}

impl LedgerService {
    pub fn new(store: Arc<SkuStore>, event_sender: EventSender) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    pub(crate) fn store(&self) -> &Arc<SkuStore> {
        &self.store
    }

    /// Appends a transaction and projects the balance in one critical
    /// section. Rejects non-positive quantities and any debit that would
    /// drive on-hand negative.
    #[instrument(skip(self))]
    pub async fn append(&self, new_txn: NewTransaction) -> Result<StockTransaction, ServiceError> {
        let mut state = self.store.lock(&new_txn.key).await?;
        self.append_locked(&mut state, new_txn, None)
    }

    /// Append under an already-held SKU guard. Reservation consumption and
    /// transfer steps use this to keep their whole check-then-act sequence in
    /// one critical section.
    pub(crate) fn append_locked(
        &self,
        state: &mut OwnedMutexGuard<SkuState>,
        new_txn: NewTransaction,
        preferred_reservation: Option<Uuid>,
    ) -> Result<StockTransaction, ServiceError> {
        let now = Utc::now();
        self.sweep_and_notify(state, now);

        match new_txn.transaction_type {
            TransactionType::Adjustment => {
                if new_txn.quantity == 0 {
                    return Err(ServiceError::ValidationError(
                        "adjustment delta must be non-zero".to_string(),
                    ));
                }
            }
            _ => {
                if new_txn.quantity <= 0 {
                    return Err(ServiceError::ValidationError(
                        "quantity must be positive".to_string(),
                    ));
                }
            }
        }

        let projected = state.balance.project(&new_txn)?;
        let txn = StockTransaction {
            id: Uuid::new_v4(),
            key: new_txn.key.clone(),
            transaction_type: new_txn.transaction_type,
            quantity: new_txn.quantity.abs(),
            delta: new_txn.delta(),
            unit_cost: new_txn.unit_cost,
            reference: new_txn.reference.clone(),
            occurred_at: now,
            on_hand_after: projected.on_hand,
        };

        state.balance = projected;

        // An issue citing a reference consumes the matching active
        // reservation and drops its claim.
        if txn.transaction_type == TransactionType::Issue {
            if let Some(reference) = &txn.reference {
                let target = state
                    .reservations
                    .iter()
                    .position(|r| {
                        r.status == ReservationStatus::Active
                            && r.reference == *reference
                            && preferred_reservation.map_or(true, |id| r.id == id)
                    })
                    .or_else(|| {
                        preferred_reservation.and_then(|id| {
                            state
                                .reservations
                                .iter()
                                .position(|r| r.status == ReservationStatus::Active && r.id == id)
                        })
                    });
                if let Some(idx) = target {
                    let quantity = state.reservations[idx].quantity;
                    let reservation_id = state.reservations[idx].id;
                    state.reservations[idx].status = ReservationStatus::Consumed;
                    state.reservations[idx].updated_at = Some(now);
                    state.balance.reserved -= quantity;
                    self.event_sender.notify(Event::ReservationConsumed {
                        reservation_id,
                        key: txn.key.clone(),
                        issued_quantity: txn.quantity,
                    });
                }
            }
        }

        // Direct issues check only on-hand. When that leaves active claims
        // above on-hand the condition is flagged, not prevented.
        if txn.delta < 0 {
            let reserved_total = state.active_reserved_total(now);
            if reserved_total > state.balance.on_hand {
                warn!(
                    key = %txn.key,
                    reserved_total,
                    on_hand = state.balance.on_hand,
                    "Active reservations exceed on-hand after debit"
                );
                self.event_sender.notify(Event::ReservationIntegrityWarning {
                    key: txn.key.clone(),
                    reserved_total,
                    on_hand: state.balance.on_hand,
                });
            }
        }

        state.log.push(txn.clone());
        self.store.journal_push(txn.clone());

        info!(
            transaction_id = %txn.id,
            key = %txn.key,
            transaction_type = txn.transaction_type.as_str(),
            delta = txn.delta,
            on_hand = txn.on_hand_after,
            "Recorded stock transaction"
        );
        self.event_sender.notify(Event::TransactionRecorded {
            transaction_id: txn.id,
            key: txn.key.clone(),
            transaction_type: txn.transaction_type,
            quantity: txn.quantity,
            on_hand_after: txn.on_hand_after,
        });
        self.event_sender.notify(Event::BalanceChanged {
            key: txn.key.clone(),
            delta: txn.delta,
            on_hand: state.balance.on_hand,
            available: state.balance.available(),
        });

        Ok(txn)
    }

    pub(crate) fn sweep_and_notify(&self, state: &mut OwnedMutexGuard<SkuState>, now: DateTime<Utc>) {
        for expired in state.sweep_expired(now) {
            info!(reservation_id = %expired.id, key = %expired.key, "Reservation expired");
            self.event_sender.notify(Event::ReservationExpired {
                reservation_id: expired.id,
                key: expired.key,
                quantity: expired.quantity,
                expired_at: now,
            });
        }
    }

    /// Current balance of a SKU. Unknown keys read as zero rather than an
    /// error, matching create-on-first-reference semantics.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, key: &SkuKey) -> Result<BalanceSummary, ServiceError> {
        let mut state = self.store.lock(key).await?;
        let now = Utc::now();
        self.sweep_and_notify(&mut state, now);
        Ok(BalanceSummary {
            key: key.clone(),
            on_hand: state.balance.on_hand,
            reserved: state.balance.reserved,
            available: state.balance.available(),
            as_of: now,
        })
    }

    /// Whether at least `quantity` units are available to claim.
    #[instrument(skip(self))]
    pub async fn is_in_stock(&self, key: &SkuKey, quantity: i64) -> Result<bool, ServiceError> {
        let summary = self.get_balance(key).await?;
        Ok(summary.available >= quantity)
    }

    /// One SKU's slice of the log, oldest first.
    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        key: &SkuKey,
    ) -> Result<Vec<StockTransaction>, ServiceError> {
        let state = self.store.lock(key).await?;
        Ok(state.log.clone())
    }

    /// Pages the global journal, newest first.
    #[instrument(skip(self))]
    pub async fn list_journal(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<StockTransaction>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ServiceError::ValidationError(format!(
                "Limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(self.store.journal_page(page, limit))
    }

    /// Recomputes a SKU's on-hand by folding its full log from zero. The
    /// result always equals the maintained balance; callers use this as a
    /// consistency check.
    #[instrument(skip(self))]
    pub async fn replay(&self, key: &SkuKey) -> Result<i64, ServiceError> {
        let state = self.store.lock(key).await?;
        Ok(StockBalance::replay(&state.log))
    }
}
