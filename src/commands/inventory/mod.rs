pub mod bulk_transactions_command;
pub mod create_adjustment_command;
pub mod create_issue_command;
pub mod create_receipt_command;
pub mod create_reservation_command;
pub mod create_transaction_command;
pub mod create_transfer_command;

pub use bulk_transactions_command::BulkTransactionsCommand;
pub use create_adjustment_command::CreateAdjustmentCommand;
pub use create_issue_command::CreateIssueCommand;
pub use create_receipt_command::CreateReceiptCommand;
pub use create_reservation_command::CreateReservationCommand;
pub use create_transaction_command::CreateTransactionCommand;
pub use create_transfer_command::{CompleteTransferCommand, CreateTransferCommand};

use rust_decimal::Decimal;
use validator::ValidationError;

/// Unit costs are money amounts at the boundary: non-negative, at most two
/// decimal places.
pub(crate) fn validate_unit_cost(unit_cost: &Decimal) -> Result<(), ValidationError> {
    if unit_cost.is_sign_negative() {
        return Err(ValidationError::new("unit_cost_negative"));
    }
    if unit_cost.scale() > 2 {
        return Err(ValidationError::new("unit_cost_precision"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unit_cost_boundary_rules() {
        assert!(validate_unit_cost(&dec!(0)).is_ok());
        assert!(validate_unit_cost(&dec!(19.99)).is_ok());
        assert!(validate_unit_cost(&dec!(-0.01)).is_err());
        assert!(validate_unit_cost(&dec!(1.999)).is_err());
    }
}
