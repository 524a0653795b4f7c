//! Reservation lifecycle tests through the command boundary
//!
//! Tests cover:
//! - Creation against available quantity via CreateReservationCommand
//! - Consumption by an issue citing the reservation's reference
//! - Expiry discovered lazily before the next reservation check

use chrono::{Duration, Utc};
use std::sync::Arc;
use stockledger::commands::inventory::{CreateIssueCommand, CreateReservationCommand};
use stockledger::commands::Command;
use stockledger::{
    LedgerEngine, NewTransaction, ReservationStatus, ServiceError, SkuKey, TransactionType,
};
use uuid::Uuid;

async fn seed(engine: &LedgerEngine, key: &SkuKey, quantity: i64) {
    engine
        .ledger
        .append(NewTransaction::new(
            key.clone(),
            TransactionType::Receipt,
            quantity,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn issue_citing_reference_consumes_reservation() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let order = Uuid::new_v4();
    let k = SkuKey::new(product, warehouse);
    seed(&engine, &k, 100).await;

    let reservation = CreateReservationCommand {
        product_id: product.to_string(),
        warehouse_id: warehouse.to_string(),
        lot_id: None,
        quantity: 30,
        reference_type: "sales_order".to_string(),
        reference_id: order.to_string(),
        expires_at: None,
    }
    .execute(engine.clone())
    .await
    .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Active);

    CreateIssueCommand {
        product_id: product.to_string(),
        warehouse_id: warehouse.to_string(),
        lot_id: None,
        quantity: 30,
        reference_type: Some("sales_order".to_string()),
        reference_id: Some(order.to_string()),
    }
    .execute(engine.clone())
    .await
    .unwrap();

    let stored = engine
        .reservations
        .get_reservation(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ReservationStatus::Consumed);

    let balance = engine.ledger.get_balance(&k).await.unwrap();
    assert_eq!(balance.on_hand, 70);
    assert_eq!(balance.reserved, 0);
    assert_eq!(balance.available, 70);
}

#[tokio::test]
async fn reservation_beyond_available_rejected_at_creation() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let k = SkuKey::new(product, warehouse);
    seed(&engine, &k, 20).await;

    let result = CreateReservationCommand {
        product_id: product.to_string(),
        warehouse_id: warehouse.to_string(),
        lot_id: None,
        quantity: 21,
        reference_type: "sales_order".to_string(),
        reference_id: Uuid::new_v4().to_string(),
        expires_at: None,
    }
    .execute(engine.clone())
    .await;
    assert!(matches!(result, Err(ServiceError::InsufficientAvailable(_))));
}

#[tokio::test]
async fn expiry_frees_claim_for_subsequent_reservations() {
    let (engine, _rx) = LedgerEngine::with_defaults();
    let engine = Arc::new(engine);
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let k = SkuKey::new(product, warehouse);
    seed(&engine, &k, 10).await;

    let soon = Utc::now() + Duration::milliseconds(30);
    let first = CreateReservationCommand {
        product_id: product.to_string(),
        warehouse_id: warehouse.to_string(),
        lot_id: None,
        quantity: 10,
        reference_type: "sales_order".to_string(),
        reference_id: Uuid::new_v4().to_string(),
        expires_at: Some(soon),
    }
    .execute(engine.clone())
    .await
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;

    // Lazy sweep on the next reserve frees the expired claim.
    let second = engine
        .reservations
        .reserve(
            k.clone(),
            10,
            stockledger::Reference::new("sales_order", Uuid::new_v4()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(second.quantity, 10);

    let stored = engine
        .reservations
        .get_reservation(first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ReservationStatus::Expired);

    let stats = engine.reservations.reservation_stats().await.unwrap();
    assert_eq!(stats.total_reservations, 2);
    assert_eq!(stats.active_reservations, 1);
    assert_eq!(stats.expired_not_swept, 0);
}
