//! Transfer coordinator flow tests
//!
//! Tests cover:
//! - Full transfer lifecycle through the command boundary
//! - Failed completion with compensating reversal (inactive destination)
//! - Transfer conservation: debit equals credit, reversal restores source

use std::sync::Arc;
use stockledger::commands::inventory::{CompleteTransferCommand, CreateTransferCommand};
use stockledger::commands::Command;
use stockledger::{
    Event, LedgerEngine, NewTransaction, ServiceError, SkuKey, TransactionType, TransferStatus,
};
use uuid::Uuid;

async fn seed(engine: &LedgerEngine, product: Uuid, warehouse: Uuid, quantity: i64) {
    engine
        .ledger
        .append(NewTransaction::new(
            SkuKey::new(product, warehouse),
            TransactionType::Receipt,
            quantity,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn completed_transfer_conserves_quantity() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let (wh_a, wh_b) = (Uuid::new_v4(), Uuid::new_v4());
    seed(&engine, product, wh_a, 100).await;

    let dispatched = CreateTransferCommand {
        product_id: product.to_string(),
        from_warehouse_id: wh_a.to_string(),
        to_warehouse_id: wh_b.to_string(),
        lot_id: None,
        quantity: 50,
    }
    .execute(engine.clone())
    .await
    .unwrap();
    assert_eq!(dispatched.status, TransferStatus::InTransit);

    let completed = CompleteTransferCommand {
        transfer_id: dispatched.id.to_string(),
    }
    .execute(engine.clone())
    .await
    .unwrap();
    assert_eq!(completed.status, TransferStatus::Completed);

    let source = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_a))
        .await
        .unwrap();
    let destination = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_b))
        .await
        .unwrap();
    assert_eq!(source.on_hand, 50);
    assert_eq!(destination.on_hand, 50);

    // Debit equals credit exactly.
    let out = engine
        .ledger
        .list_transactions(&SkuKey::new(product, wh_a))
        .await
        .unwrap();
    let debit: i64 = out
        .iter()
        .filter(|t| t.transaction_type == TransactionType::TransferOut)
        .map(|t| t.quantity)
        .sum();
    let into = engine
        .ledger
        .list_transactions(&SkuKey::new(product, wh_b))
        .await
        .unwrap();
    let credit: i64 = into
        .iter()
        .filter(|t| t.transaction_type == TransactionType::TransferIn)
        .map(|t| t.quantity)
        .sum();
    assert_eq!(debit, 50);
    assert_eq!(debit, credit);
}

#[tokio::test]
async fn inactive_destination_reverses_source_exactly() {
    let (engine, mut rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let (wh_a, wh_b) = (Uuid::new_v4(), Uuid::new_v4());
    seed(&engine, product, wh_a, 100).await;

    let dispatched = CreateTransferCommand {
        product_id: product.to_string(),
        from_warehouse_id: wh_a.to_string(),
        to_warehouse_id: wh_b.to_string(),
        lot_id: None,
        quantity: 50,
    }
    .execute(engine.clone())
    .await
    .unwrap();

    engine.set_warehouse_active(wh_b, false);

    let failed = CompleteTransferCommand {
        transfer_id: dispatched.id.to_string(),
    }
    .execute(engine.clone())
    .await
    .unwrap();
    assert_eq!(failed.status, TransferStatus::Failed);

    // Source reverts to its pre-transfer balance; destination untouched.
    let source = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_a))
        .await
        .unwrap();
    let destination = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_b))
        .await
        .unwrap();
    assert_eq!(source.on_hand, 100);
    assert_eq!(destination.on_hand, 0);

    // The reversal was recorded as a transaction and announced.
    let mut reversed = false;
    while let Ok(event) = rx.try_recv() {
        if let Event::TransferReversed {
            transfer_id,
            quantity,
            ..
        } = event
        {
            assert_eq!(transfer_id, failed.id);
            assert_eq!(quantity, 50);
            reversed = true;
        }
    }
    assert!(reversed, "reversal must be announced");
}

#[tokio::test]
async fn same_warehouse_transfer_rejected_at_boundary() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let wh = Uuid::new_v4();

    let result = CreateTransferCommand {
        product_id: Uuid::new_v4().to_string(),
        from_warehouse_id: wh.to_string(),
        to_warehouse_id: wh.to_string(),
        lot_id: None,
        quantity: 5,
    }
    .execute(engine)
    .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn opposite_direction_transfers_complete_without_deadlock() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let (wh_a, wh_b) = (Uuid::new_v4(), Uuid::new_v4());
    seed(&engine, product, wh_a, 100).await;
    seed(&engine, product, wh_b, 100).await;

    let a_to_b = engine
        .transfers
        .initiate(product, wh_a, wh_b, None, 10)
        .await
        .unwrap();
    let b_to_a = engine
        .transfers
        .initiate(product, wh_b, wh_a, None, 10)
        .await
        .unwrap();
    engine.transfers.dispatch(a_to_b.id).await.unwrap();
    engine.transfers.dispatch(b_to_a.id).await.unwrap();

    let (left, right) = tokio::join!(
        engine.transfers.complete(a_to_b.id),
        engine.transfers.complete(b_to_a.id),
    );
    assert_eq!(left.unwrap().status, TransferStatus::Completed);
    assert_eq!(right.unwrap().status, TransferStatus::Completed);

    let a = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_a))
        .await
        .unwrap();
    let b = engine
        .ledger
        .get_balance(&SkuKey::new(product, wh_b))
        .await
        .unwrap();
    assert_eq!(a.on_hand, 100);
    assert_eq!(b.on_hand, 100);
}
