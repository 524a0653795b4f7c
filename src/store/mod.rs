//! Keyed in-memory store for SKU state.
//!
//! Every SKU owns one critical section: mutations on the same key are
//! serialized through its `tokio::sync::Mutex`, while operations on distinct
//! keys run fully in parallel. There is no global lock; lock acquisition is
//! bounded by a timeout so callers get a retryable failure instead of
//! hanging.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Reservation, ReservationStatus, SkuKey, StockBalance, StockTransaction};

/// Mutable state of one SKU: its projected balance, its slice of the
/// append-only log, and the reservations claiming against it.
#[derive(Debug, Default)]
pub struct SkuState {
    pub balance: StockBalance,
    pub log: Vec<StockTransaction>,
    pub reservations: Vec<Reservation>,
}

impl SkuState {
    /// Transitions every active reservation whose expiry has passed to
    /// `Expired` and drops its claim. Returns the transitioned reservations
    /// so the caller can emit events outside this struct.
    ///
    /// Called on every critical-section entry so expired claims can never
    /// cause phantom unavailability.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<Reservation> {
        let mut expired = Vec::new();
        for reservation in &mut self.reservations {
            if reservation.is_past_expiry(now) {
                reservation.status = ReservationStatus::Expired;
                reservation.updated_at = Some(now);
                self.balance.reserved -= reservation.quantity;
                expired.push(reservation.clone());
            }
        }
        expired
    }

    /// Sum of claims currently held by active reservations.
    pub fn active_reserved_total(&self, now: DateTime<Utc>) -> i64 {
        self.reservations
            .iter()
            .filter(|r| r.holds_claim(now))
            .map(|r| r.quantity)
            .sum()
    }

    pub fn find_reservation_mut(&mut self, id: Uuid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }
}

/// Keyed store of SKU state plus the global ordered journal.
///
/// SKU entries are created on first reference and never removed, only
/// zeroed, so a key observed once stays addressable.
pub struct SkuStore {
    skus: DashMap<SkuKey, Arc<Mutex<SkuState>>>,
    journal: RwLock<Vec<StockTransaction>>,
    lock_timeout: Duration,
}

impl SkuStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            skus: DashMap::new(),
            journal: RwLock::new(Vec::new()),
            lock_timeout,
        }
    }

    fn entry(&self, key: &SkuKey) -> Arc<Mutex<SkuState>> {
        self.skus
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SkuState::default())))
            .clone()
    }

    /// Acquires a SKU's critical section, bounded by the configured timeout.
    pub async fn lock(&self, key: &SkuKey) -> Result<OwnedMutexGuard<SkuState>, ServiceError> {
        let cell = self.entry(key);
        timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| ServiceError::LockTimeout(format!("SKU {} is busy", key)))
    }

    /// Acquires two SKUs' critical sections in the fixed global (key) order,
    /// returning the guards in argument order. Used by transfers so that
    /// concurrent opposite-direction transfers cannot deadlock.
    pub async fn lock_pair(
        &self,
        first: &SkuKey,
        second: &SkuKey,
    ) -> Result<(OwnedMutexGuard<SkuState>, OwnedMutexGuard<SkuState>), ServiceError> {
        if first == second {
            return Err(ServiceError::InvalidOperation(
                "cannot lock the same SKU twice".to_string(),
            ));
        }
        if first < second {
            let a = self.lock(first).await?;
            let b = self.lock(second).await?;
            Ok((a, b))
        } else {
            let b = self.lock(second).await?;
            let a = self.lock(first).await?;
            Ok((a, b))
        }
    }

    /// Appends to the global ordered journal.
    pub fn journal_push(&self, txn: StockTransaction) {
        self.journal
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(txn);
    }

    /// Snapshot of a page of the global journal, newest first, together with
    /// the total count.
    pub fn journal_page(&self, page: u64, limit: u64) -> (Vec<StockTransaction>, u64) {
        let journal = self
            .journal
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let total = journal.len() as u64;
        // Saturating: an out-of-range page reads as an empty page, never a
        // wrapped offset.
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let items = journal
            .iter()
            .rev()
            .skip(offset.min(usize::MAX as u64) as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        (items, total)
    }

    /// All keys currently known to the store.
    pub fn keys(&self) -> Vec<SkuKey> {
        self.skus.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Registry of warehouse activation flags consulted by the transfer
/// coordinator. Unknown warehouses are treated as active.
#[derive(Debug, Default)]
pub struct WarehouseRegistry {
    inactive: DashMap<Uuid, ()>,
}

impl WarehouseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, warehouse_id: Uuid, active: bool) {
        if active {
            self.inactive.remove(&warehouse_id);
        } else {
            self.inactive.insert(warehouse_id, ());
        }
    }

    pub fn is_active(&self, warehouse_id: Uuid) -> bool {
        !self.inactive.contains_key(&warehouse_id)
    }
}
