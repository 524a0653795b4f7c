pub mod balance;
pub mod reservation;
pub mod sku;
pub mod transaction;
pub mod transfer;

pub use balance::StockBalance;
pub use reservation::{Reservation, ReservationStatus};
pub use sku::{Reference, SkuKey};
pub use transaction::{NewTransaction, StockTransaction, TransactionType};
pub use transfer::{Transfer, TransferStatus};
