//! Stockledger
//!
//! An inventory ledger engine maintaining per-(product, warehouse, lot) stock
//! balances from an append-only transaction log, with reservations and
//! transfers layered on top as derived state. Per-SKU mutations are
//! serialized through keyed critical sections; operations on distinct SKUs
//! run fully in parallel.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use config::LedgerConfig;
pub use errors::{BulkItemError, ServiceError};
pub use events::{Event, EventSender};
pub use models::{
    NewTransaction, Reference, Reservation, ReservationStatus, SkuKey, StockBalance,
    StockTransaction, TransactionType, Transfer, TransferStatus,
};
pub use services::{
    BalanceSummary, BulkOutcome, BulkService, LedgerService, ReservationService, ReservationStats,
    ReservationSummary, SweepOutcome, TransferService, TransferSummary,
};
pub use store::{SkuStore, WarehouseRegistry};

/// The assembled engine: one shared store, one event channel, and the four
/// services over them.
#[derive(Clone)]
pub struct LedgerEngine {
    pub config: LedgerConfig,
    pub ledger: LedgerService,
    pub reservations: ReservationService,
    pub transfers: TransferService,
    pub bulk: BulkService,
    warehouses: Arc<WarehouseRegistry>,
}

impl LedgerEngine {
    /// Builds an engine from configuration, returning it together with the
    /// receiving half of its event channel.
    pub fn new(config: LedgerConfig) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, receiver) = EventSender::channel(config.event_channel_capacity);
        let store = Arc::new(SkuStore::new(config.lock_timeout()));
        let warehouses = Arc::new(WarehouseRegistry::new());

        let ledger = LedgerService::new(store, event_sender.clone());
        let reservations = ReservationService::new(ledger.clone(), event_sender.clone(), &config);
        let transfers = TransferService::new(ledger.clone(), event_sender, warehouses.clone());
        let bulk = BulkService::new(ledger.clone(), &config);

        (
            Self {
                config,
                ledger,
                reservations,
                transfers,
                bulk,
                warehouses,
            },
            receiver,
        )
    }

    /// Engine with default configuration, for embedding and tests.
    pub fn with_defaults() -> (Self, mpsc::Receiver<Event>) {
        Self::new(LedgerConfig::default())
    }

    /// Marks a warehouse active or inactive. Inactive destinations reject
    /// transfer completion, failing the transfer with a reversal.
    pub fn set_warehouse_active(&self, warehouse_id: Uuid, active: bool) {
        self.warehouses.set_active(warehouse_id, active);
    }
}

/// Initializes the global tracing subscriber from `RUST_LOG`, defaulting to
/// info level. Safe to call once per process.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
