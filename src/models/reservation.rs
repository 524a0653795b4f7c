use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::sku::{Reference, SkuKey};

/// Lifecycle of a reservation claim.
///
/// Created active; moves to `Consumed` when matched by an issue citing the
/// same reference, `Released` on explicit cancellation, or `Expired` once its
/// expiry passes without consumption. All three are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Released,
    Consumed,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

/// A temporary, expiring claim against a SKU's available quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub key: SkuKey,
    pub quantity: i64,
    pub reference: Reference,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// An active reservation past its expiry still holds its claim until a
    /// sweep observes it; this is the predicate sweeps use.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at < now
    }

    /// Whether the claim currently counts against available quantity.
    pub fn holds_claim(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at >= now
    }
}
