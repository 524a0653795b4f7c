pub mod bulk;
pub mod ledger;
pub mod reservations;
pub mod transfers;

pub use bulk::{BulkOutcome, BulkService};
pub use ledger::{BalanceSummary, LedgerService};
pub use reservations::{ReservationService, ReservationStats, ReservationSummary, SweepOutcome};
pub use transfers::{TransferService, TransferSummary};
