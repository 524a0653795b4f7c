use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::models::{SkuKey, TransactionType, TransferStatus};

/// Events emitted by the ledger engine for downstream consumers (reporting,
/// alerts, dashboards). Fire-and-forget: delivery is never part of the
/// transactional guarantee, and a full or closed channel only logs a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TransactionRecorded {
        transaction_id: Uuid,
        key: SkuKey,
        transaction_type: TransactionType,
        quantity: i64,
        on_hand_after: i64,
    },
    BalanceChanged {
        key: SkuKey,
        delta: i64,
        on_hand: i64,
        available: i64,
    },
    ReservationCreated {
        reservation_id: Uuid,
        key: SkuKey,
        quantity: i64,
        expires_at: DateTime<Utc>,
    },
    ReservationReleased {
        reservation_id: Uuid,
        key: SkuKey,
        quantity: i64,
    },
    ReservationConsumed {
        reservation_id: Uuid,
        key: SkuKey,
        issued_quantity: i64,
    },
    ReservationExpired {
        reservation_id: Uuid,
        key: SkuKey,
        quantity: i64,
        expired_at: DateTime<Utc>,
    },
    /// Active reservation claims exceed on-hand after a direct issue.
    /// Direct issues check only on-hand, so this is detectable and flagged
    /// rather than prevented.
    ReservationIntegrityWarning {
        key: SkuKey,
        reserved_total: i64,
        on_hand: i64,
    },
    TransferStatusChanged {
        transfer_id: Uuid,
        old_status: TransferStatus,
        new_status: TransferStatus,
    },
    TransferReversed {
        transfer_id: Uuid,
        source: SkuKey,
        quantity: i64,
        reversal_transaction_id: Uuid,
    },
}

/// Sending half of the engine's event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates an EventSender over an existing channel.
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and its sending half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event, waiting for channel capacity.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort notification used inside SKU critical sections: never
    /// blocks, never fails the mutation that produced the event.
    pub fn notify(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(error = %e, "Dropped ledger event");
        }
    }
}
