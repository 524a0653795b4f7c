//! Reservation manager.
//!
//! Reservations claim against available quantity (on-hand minus active
//! claims). Creation is check-then-act inside the SKU's critical section, so
//! concurrent reservations on one SKU cannot both pass the availability
//! check. Expiry is discovered lazily on every critical-section entry, with
//! `sweep_expired` available for periodic callers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    NewTransaction, Reference, Reservation, ReservationStatus, SkuKey, StockTransaction,
    TransactionType,
};
use crate::services::ledger::LedgerService;

/// Result of an expiry sweep across all SKUs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Number of reservations transitioned to expired.
    pub expired_count: u64,
    /// Timestamp when the sweep ran.
    pub swept_at: DateTime<Utc>,
}

/// Aggregate reservation counts for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStats {
    pub total_reservations: u64,
    pub active_reservations: u64,
    pub expired_not_swept: u64,
    pub stats_at: DateTime<Utc>,
}

/// Summary of a reservation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub key: SkuKey,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub reference: Reference,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
}

impl From<Reservation> for ReservationSummary {
    fn from(r: Reservation) -> Self {
        let is_expired =
            r.status == ReservationStatus::Expired || r.expires_at < Utc::now();
        Self {
            id: r.id,
            key: r.key,
            quantity: r.quantity,
            status: r.status,
            reference: r.reference,
            expires_at: r.expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
            is_expired,
        }
    }
}

/// Service for creating, consuming, releasing, and sweeping reservations.
#[derive(Clone)]
pub struct ReservationService {
    ledger: LedgerService,
    event_sender: EventSender,
    /// Maps reservation ids to the SKU that owns them, so lookups by id know
    /// which critical section to enter.
    index: Arc<DashMap<Uuid, SkuKey>>,
    default_ttl: chrono::Duration,
}

impl ReservationService {
    pub fn new(ledger: LedgerService, event_sender: EventSender, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            event_sender,
            index: Arc::new(DashMap::new()),
            default_ttl: config.reservation_ttl(),
        }
    }

    /// Creates an active reservation against a SKU's available quantity.
    ///
    /// Expired claims are swept before the availability check so they can
    /// never cause phantom unavailability.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        key: SkuKey,
        quantity: i64,
        reference: Reference,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ReservationSummary, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let mut state = self.ledger.store().lock(&key).await?;
        let now = Utc::now();
        self.ledger.sweep_and_notify(&mut state, now);

        let available = state.balance.available();
        if quantity > available {
            return Err(ServiceError::InsufficientAvailable(format!(
                "requested {} but only {} available for SKU {}",
                quantity, available, key
            )));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            key: key.clone(),
            quantity,
            reference,
            status: ReservationStatus::Active,
            expires_at: expires_at.unwrap_or(now + self.default_ttl),
            created_at: now,
            updated_at: None,
        };
        state.balance.reserved += quantity;
        state.reservations.push(reservation.clone());
        self.index.insert(reservation.id, key.clone());

        info!(
            reservation_id = %reservation.id,
            key = %key,
            quantity,
            expires_at = %reservation.expires_at,
            "Created reservation"
        );
        self.event_sender.notify(Event::ReservationCreated {
            reservation_id: reservation.id,
            key,
            quantity,
            expires_at: reservation.expires_at,
        });

        Ok(ReservationSummary::from(reservation))
    }

    /// Consumes a reservation by appending the paired issue transaction.
    /// `issued_quantity` may be at most the reserved quantity; the claim is
    /// dropped in full either way.
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        reservation_id: Uuid,
        issued_quantity: i64,
    ) -> Result<StockTransaction, ServiceError> {
        let key = self.key_for(reservation_id)?;
        let mut state = self.ledger.store().lock(&key).await?;
        let now = Utc::now();
        self.ledger.sweep_and_notify(&mut state, now);

        let reservation = state
            .find_reservation_mut(reservation_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?
            .clone();

        match reservation.status {
            ReservationStatus::Active => {}
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot consume a {} reservation",
                    other
                )));
            }
        }
        if issued_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if issued_quantity > reservation.quantity {
            return Err(ServiceError::ValidationError(format!(
                "issued quantity {} exceeds reserved quantity {}",
                issued_quantity, reservation.quantity
            )));
        }

        let issue = NewTransaction::new(key, TransactionType::Issue, issued_quantity)
            .with_reference(reservation.reference.clone());
        self.ledger
            .append_locked(&mut state, issue, Some(reservation_id))
    }

    /// Releases an active reservation, freeing its claim immediately.
    #[instrument(skip(self))]
    pub async fn release(&self, reservation_id: Uuid) -> Result<ReservationSummary, ServiceError> {
        let key = self.key_for(reservation_id)?;
        let mut state = self.ledger.store().lock(&key).await?;
        let now = Utc::now();
        self.ledger.sweep_and_notify(&mut state, now);

        let reservation = state.find_reservation_mut(reservation_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
        })?;

        match reservation.status {
            ReservationStatus::Active => {}
            ReservationStatus::Released => {
                return Err(ServiceError::InvalidOperation(
                    "Reservation is already released".to_string(),
                ));
            }
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot release a {} reservation",
                    other
                )));
            }
        }

        reservation.status = ReservationStatus::Released;
        reservation.updated_at = Some(now);
        let released = reservation.clone();
        state.balance.reserved -= released.quantity;

        info!(reservation_id = %reservation_id, key = %released.key, "Released reservation");
        self.event_sender.notify(Event::ReservationReleased {
            reservation_id,
            key: released.key.clone(),
            quantity: released.quantity,
        });

        Ok(ReservationSummary::from(released))
    }

    /// Gets a reservation by id.
    #[instrument(skip(self))]
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<ReservationSummary>, ServiceError> {
        let key = match self.index.get(&reservation_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        let mut state = self.ledger.store().lock(&key).await?;
        self.ledger.sweep_and_notify(&mut state, Utc::now());
        Ok(state
            .find_reservation_mut(reservation_id)
            .map(|r| ReservationSummary::from(r.clone())))
    }

    /// Lists reservations with optional status and product filters.
    #[instrument(skip(self))]
    pub async fn list_reservations(
        &self,
        status_filter: Option<ReservationStatus>,
        product_id_filter: Option<Uuid>,
    ) -> Result<Vec<ReservationSummary>, ServiceError> {
        let mut summaries = Vec::new();
        for key in self.ledger.store().keys() {
            if let Some(product_id) = product_id_filter {
                if key.product_id != product_id {
                    continue;
                }
            }
            let mut state = self.ledger.store().lock(&key).await?;
            self.ledger.sweep_and_notify(&mut state, Utc::now());
            summaries.extend(
                state
                    .reservations
                    .iter()
                    .filter(|r| status_filter.map_or(true, |s| r.status == s))
                    .cloned()
                    .map(ReservationSummary::from),
            );
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Transitions every past-expiry active reservation to expired across all
    /// SKUs. Intended for periodic callers; the same sweep also happens
    /// lazily on every SKU access.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<SweepOutcome, ServiceError> {
        let now = Utc::now();
        let mut expired_count = 0u64;
        for key in self.ledger.store().keys() {
            let mut state = self.ledger.store().lock(&key).await?;
            for expired in state.sweep_expired(now) {
                expired_count += 1;
                info!(
                    reservation_id = %expired.id,
                    key = %expired.key,
                    "Marked reservation as expired"
                );
                self.event_sender.notify(Event::ReservationExpired {
                    reservation_id: expired.id,
                    key: expired.key,
                    quantity: expired.quantity,
                    expired_at: now,
                });
            }
        }

        info!(expired_count, "Completed expired reservation sweep");
        Ok(SweepOutcome {
            expired_count,
            swept_at: now,
        })
    }

    /// Aggregate counts over all reservations.
    #[instrument(skip(self))]
    pub async fn reservation_stats(&self) -> Result<ReservationStats, ServiceError> {
        let now = Utc::now();
        let mut total = 0u64;
        let mut active = 0u64;
        let mut expired_not_swept = 0u64;
        for key in self.ledger.store().keys() {
            let state = self.ledger.store().lock(&key).await?;
            for r in &state.reservations {
                total += 1;
                if r.holds_claim(now) {
                    active += 1;
                } else if r.is_past_expiry(now) {
                    expired_not_swept += 1;
                }
            }
        }
        Ok(ReservationStats {
            total_reservations: total,
            active_reservations: active,
            expired_not_swept,
            stats_at: now,
        })
    }

    fn key_for(&self, reservation_id: Uuid) -> Result<SkuKey, ServiceError> {
        self.index
            .get(&reservation_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SkuStore;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn services() -> (LedgerService, ReservationService) {
        let store = Arc::new(SkuStore::new(std::time::Duration::from_millis(200)));
        let (event_sender, _rx) = EventSender::channel(64);
        let ledger = LedgerService::new(store, event_sender.clone());
        let reservations =
            ReservationService::new(ledger.clone(), event_sender, &LedgerConfig::default());
        (ledger, reservations)
    }

    fn key() -> SkuKey {
        SkuKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn reference() -> Reference {
        Reference::new("sales_order", Uuid::new_v4())
    }

    async fn seed(ledger: &LedgerService, key: &SkuKey, quantity: i64) {
        ledger
            .append(NewTransaction::new(
                key.clone(),
                TransactionType::Receipt,
                quantity,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reserve_reduces_available_not_on_hand() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 100).await;

        let summary = reservations
            .reserve(k.clone(), 30, reference(), None)
            .await
            .unwrap();
        assert_eq!(summary.status, ReservationStatus::Active);

        let balance = ledger.get_balance(&k).await.unwrap();
        assert_eq!(balance.on_hand, 100);
        assert_eq!(balance.reserved, 30);
        assert_eq!(balance.available, 70);
    }

    #[tokio::test]
    async fn reserve_beyond_available_fails() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 50).await;

        reservations
            .reserve(k.clone(), 40, reference(), None)
            .await
            .unwrap();
        let result = reservations.reserve(k.clone(), 20, reference(), None).await;
        assert_matches!(result, Err(ServiceError::InsufficientAvailable(_)));
    }

    #[tokio::test]
    async fn expired_claims_free_up_before_reserve() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 50).await;

        let past = Utc::now() - Duration::seconds(1);
        reservations
            .reserve(k.clone(), 50, reference(), Some(past))
            .await
            .unwrap();

        // The expired claim is swept on entry, so the full quantity is free.
        let summary = reservations
            .reserve(k.clone(), 50, reference(), None)
            .await
            .unwrap();
        assert_eq!(summary.quantity, 50);
    }

    #[tokio::test]
    async fn consume_appends_paired_issue_and_frees_claim() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 100).await;

        let summary = reservations
            .reserve(k.clone(), 30, reference(), None)
            .await
            .unwrap();
        let issue = reservations.consume(summary.id, 30).await.unwrap();
        assert_eq!(issue.transaction_type, TransactionType::Issue);
        assert_eq!(issue.on_hand_after, 70);

        let balance = ledger.get_balance(&k).await.unwrap();
        assert_eq!(balance.reserved, 0);
        assert_eq!(balance.available, 70);

        let stored = reservations.get_reservation(summary.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Consumed);
    }

    #[tokio::test]
    async fn consume_more_than_reserved_is_rejected() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 100).await;

        let summary = reservations
            .reserve(k.clone(), 10, reference(), None)
            .await
            .unwrap();
        let result = reservations.consume(summary.id, 11).await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn release_frees_claim_and_is_not_repeatable() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 20).await;

        let summary = reservations
            .reserve(k.clone(), 20, reference(), None)
            .await
            .unwrap();
        let released = reservations.release(summary.id).await.unwrap();
        assert_eq!(released.status, ReservationStatus::Released);
        assert_eq!(ledger.get_balance(&k).await.unwrap().available, 20);

        let again = reservations.release(summary.id).await;
        assert_matches!(again, Err(ServiceError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn sweep_reports_expired_count() {
        let (ledger, reservations) = services();
        let k = key();
        seed(&ledger, &k, 10).await;

        let past = Utc::now() - Duration::seconds(1);
        reservations
            .reserve(k.clone(), 5, reference(), Some(past))
            .await
            .unwrap();

        let outcome = reservations.sweep_expired().await.unwrap();
        assert_eq!(outcome.expired_count, 1);

        let stats = reservations.reservation_stats().await.unwrap();
        assert_eq!(stats.total_reservations, 1);
        assert_eq!(stats.active_reservations, 0);
        assert_eq!(stats.expired_not_swept, 0);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_product() {
        let (ledger, reservations) = services();
        let k1 = key();
        let k2 = key();
        seed(&ledger, &k1, 50).await;
        seed(&ledger, &k2, 50).await;

        let first = reservations
            .reserve(k1.clone(), 10, reference(), None)
            .await
            .unwrap();
        reservations
            .reserve(k2.clone(), 20, reference(), None)
            .await
            .unwrap();
        reservations.release(first.id).await.unwrap();

        let active = reservations
            .list_reservations(Some(ReservationStatus::Active), None)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key, k2);

        let for_first_product = reservations
            .list_reservations(None, Some(k1.product_id))
            .await
            .unwrap();
        assert_eq!(for_first_product.len(), 1);
        assert_eq!(for_first_product[0].id, first.id);
        assert_eq!(for_first_product[0].status, ReservationStatus::Released);

        let all = reservations.list_reservations(None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let (_, reservations) = services();
        let result = reservations.release(Uuid::new_v4()).await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }
}
