//! Transfer coordinator.
//!
//! A transfer is a paired debit/credit across two warehouses: pending until
//! dispatched, in transit once the outbound debit is recorded, then completed
//! by the inbound credit or failed with the debit reversed. The reversal is
//! itself a recorded transaction, never an edit, so a transfer can complete
//! or fail but can never vanish quantity.

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    NewTransaction, Reference, Transfer, TransferStatus, TransactionType,
};
use crate::services::ledger::LedgerService;
use crate::store::WarehouseRegistry;

const TRANSFER_REFERENCE_TYPE: &str = "transfer";
const REVERSAL_REFERENCE_TYPE: &str = "transfer_reversal";

/// Transfer view for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub lot_id: Option<String>,
    pub quantity: i64,
    pub status: TransferStatus,
    pub outbound_transaction_id: Option<Uuid>,
    pub inbound_transaction_id: Option<Uuid>,
}

impl From<&Transfer> for TransferSummary {
    fn from(t: &Transfer) -> Self {
        Self {
            id: t.id,
            product_id: t.product_id,
            from_warehouse_id: t.from_warehouse_id,
            to_warehouse_id: t.to_warehouse_id,
            lot_id: t.lot_id.clone(),
            quantity: t.quantity,
            status: t.status,
            outbound_transaction_id: t.outbound_transaction_id,
            inbound_transaction_id: t.inbound_transaction_id,
        }
    }
}

/// Service sequencing transfers through their state machine.
#[derive(Clone)]
pub struct TransferService {
    ledger: LedgerService,
    event_sender: EventSender,
    transfers: Arc<DashMap<Uuid, Arc<Mutex<Transfer>>>>,
    warehouses: Arc<WarehouseRegistry>,
}

impl TransferService {
    pub fn new(
        ledger: LedgerService,
        event_sender: EventSender,
        warehouses: Arc<WarehouseRegistry>,
    ) -> Self {
        Self {
            ledger,
            event_sender,
            transfers: Arc::new(DashMap::new()),
            warehouses,
        }
    }

    /// Creates a pending transfer. No ledger footprint yet.
    #[instrument(skip(self))]
    pub async fn initiate(
        &self,
        product_id: Uuid,
        from_warehouse_id: Uuid,
        to_warehouse_id: Uuid,
        lot_id: Option<String>,
        quantity: i64,
    ) -> Result<TransferSummary, ServiceError> {
        if from_warehouse_id == to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "Cannot transfer inventory to the same warehouse".to_string(),
            ));
        }
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let transfer = Transfer {
            id: Uuid::new_v4(),
            product_id,
            from_warehouse_id,
            to_warehouse_id,
            lot_id,
            quantity,
            status: TransferStatus::Pending,
            outbound_transaction_id: None,
            inbound_transaction_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let summary = TransferSummary::from(&transfer);
        self.transfers
            .insert(transfer.id, Arc::new(Mutex::new(transfer)));

        info!(transfer_id = %summary.id, quantity, "Initiated transfer");
        Ok(summary)
    }

    /// Records the outbound debit and moves the transfer to in-transit. The
    /// quantity is then in neither warehouse's balance.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, transfer_id: Uuid) -> Result<TransferSummary, ServiceError> {
        let cell = self.transfer_cell(transfer_id)?;
        let mut transfer = cell.lock().await;

        if transfer.status != TransferStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot dispatch a {} transfer",
                transfer.status
            )));
        }

        let source = transfer.source_key();
        let mut state = self.ledger.store().lock(&source).await?;
        let outbound = self.ledger.append_locked(
            &mut state,
            NewTransaction::new(source, TransactionType::TransferOut, transfer.quantity)
                .with_reference(Reference::new(TRANSFER_REFERENCE_TYPE, transfer.id)),
            None,
        )?;
        drop(state);

        transfer.status = TransferStatus::InTransit;
        transfer.outbound_transaction_id = Some(outbound.id);
        transfer.updated_at = Some(Utc::now());

        info!(transfer_id = %transfer.id, "Transfer dispatched");
        self.event_sender.notify(Event::TransferStatusChanged {
            transfer_id: transfer.id,
            old_status: TransferStatus::Pending,
            new_status: TransferStatus::InTransit,
        });

        Ok(TransferSummary::from(&*transfer))
    }

    /// Credits the destination and completes the transfer, or, when the
    /// destination warehouse is deactivated, reverses the outbound debit and
    /// fails it. Either way the transfer resolves without losing quantity.
    #[instrument(skip(self))]
    pub async fn complete(&self, transfer_id: Uuid) -> Result<TransferSummary, ServiceError> {
        let cell = self.transfer_cell(transfer_id)?;
        let mut transfer = cell.lock().await;

        if transfer.status != TransferStatus::InTransit {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot complete a {} transfer",
                transfer.status
            )));
        }

        let source = transfer.source_key();
        let destination = transfer.destination_key();
        // Both SKUs are locked in the fixed global key order so concurrent
        // opposite-direction transfers cannot deadlock.
        let (mut source_state, mut destination_state) =
            self.ledger.store().lock_pair(&source, &destination).await?;

        if !self.warehouses.is_active(transfer.to_warehouse_id) {
            drop(destination_state);
            let reversal = self
                .ledger
                .append_locked(
                    &mut source_state,
                    NewTransaction::new(
                        source.clone(),
                        TransactionType::TransferIn,
                        transfer.quantity,
                    )
                    .with_reference(Reference::new(REVERSAL_REFERENCE_TYPE, transfer.id)),
                    None,
                )
                .map_err(|e| {
                    let err = ServiceError::TransferReversal(format!(
                        "transfer {}: failed to re-credit source {}: {}",
                        transfer.id, source, e
                    ));
                    error!(transfer_id = %transfer.id, error = %err, "Transfer reversal failed; ledger may be inconsistent");
                    err
                })?;
            drop(source_state);

            transfer.status = TransferStatus::Failed;
            transfer.updated_at = Some(Utc::now());

            info!(transfer_id = %transfer.id, "Transfer failed; source re-credited");
            self.event_sender.notify(Event::TransferReversed {
                transfer_id: transfer.id,
                source,
                quantity: transfer.quantity,
                reversal_transaction_id: reversal.id,
            });
            self.event_sender.notify(Event::TransferStatusChanged {
                transfer_id: transfer.id,
                old_status: TransferStatus::InTransit,
                new_status: TransferStatus::Failed,
            });

            return Ok(TransferSummary::from(&*transfer));
        }

        drop(source_state);
        let inbound = self.ledger.append_locked(
            &mut destination_state,
            NewTransaction::new(
                destination,
                TransactionType::TransferIn,
                transfer.quantity,
            )
            .with_reference(Reference::new(TRANSFER_REFERENCE_TYPE, transfer.id)),
            None,
        )?;
        drop(destination_state);

        transfer.status = TransferStatus::Completed;
        transfer.inbound_transaction_id = Some(inbound.id);
        transfer.updated_at = Some(Utc::now());

        info!(transfer_id = %transfer.id, "Transfer completed");
        self.event_sender.notify(Event::TransferStatusChanged {
            transfer_id: transfer.id,
            old_status: TransferStatus::InTransit,
            new_status: TransferStatus::Completed,
        });

        Ok(TransferSummary::from(&*transfer))
    }

    /// Cancels a pending transfer. In-transit transfers are not cancellable;
    /// they must run to completed or failed-with-reversal.
    #[instrument(skip(self))]
    pub async fn cancel(&self, transfer_id: Uuid) -> Result<TransferSummary, ServiceError> {
        let cell = self.transfer_cell(transfer_id)?;
        let mut transfer = cell.lock().await;

        match transfer.status {
            TransferStatus::Pending => {}
            TransferStatus::InTransit => {
                return Err(ServiceError::InvalidOperation(
                    "Cannot cancel an in-transit transfer".to_string(),
                ));
            }
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot cancel a {} transfer",
                    other
                )));
            }
        }

        transfer.status = TransferStatus::Cancelled;
        transfer.updated_at = Some(Utc::now());

        info!(transfer_id = %transfer.id, "Transfer cancelled");
        self.event_sender.notify(Event::TransferStatusChanged {
            transfer_id: transfer.id,
            old_status: TransferStatus::Pending,
            new_status: TransferStatus::Cancelled,
        });

        Ok(TransferSummary::from(&*transfer))
    }

    /// Gets a transfer by id.
    #[instrument(skip(self))]
    pub async fn get_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<Option<TransferSummary>, ServiceError> {
        match self.transfers.get(&transfer_id) {
            Some(entry) => {
                let transfer = entry.value().lock().await;
                Ok(Some(TransferSummary::from(&*transfer)))
            }
            None => Ok(None),
        }
    }

    /// Total quantity of a product currently in transit.
    #[instrument(skip(self))]
    pub async fn in_transit_quantity(&self, product_id: Uuid) -> i64 {
        let cells: Vec<Arc<Mutex<Transfer>>> = self
            .transfers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let quantities = join_all(cells.into_iter().map(|cell| async move {
            let transfer = cell.lock().await;
            if transfer.product_id == product_id && transfer.status == TransferStatus::InTransit {
                transfer.quantity
            } else {
                0
            }
        }))
        .await;
        quantities.into_iter().sum()
    }

    fn transfer_cell(&self, transfer_id: Uuid) -> Result<Arc<Mutex<Transfer>>, ServiceError> {
        self.transfers
            .get(&transfer_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))
    }
}
