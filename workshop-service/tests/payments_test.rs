//! Payment ledger: ceiling, role guards, removal, and audit events.

mod common;

use common::{labor_item, seed_work_order, spawn_app};
use service_core::error::AppError;
use workshop_service::models::{CreatePayment, PaymentMethod, PaymentStatus, WorkOrderEvent};

async fn order_with_total(app: &common::TestApp, total_cents: i64) -> uuid::Uuid {
    let order = seed_work_order(app, &app.owner).await;
    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Service", 1, total_cents),
        )
        .await
        .unwrap();
    order.work_order_id
}

fn payment(amount_cents: i64, method: PaymentMethod) -> CreatePayment {
    CreatePayment {
        amount_cents,
        method,
        reference: None,
    }
}

/// Paid total can never pass the order total: overpayment is rejected and
/// partial payments tighten the remaining ceiling.
#[tokio::test]
async fn overpayment_is_rejected() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 10_000).await;

    let err = app
        .payments
        .add_payment(&app.owner, order_id, &payment(10_001, PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    app.payments
        .add_payment(&app.owner, order_id, &payment(6_000, PaymentMethod::Cash))
        .await
        .unwrap();

    // Only 4000 remains payable.
    let err = app
        .payments
        .add_payment(&app.owner, order_id, &payment(4_001, PaymentMethod::Card))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let order = app.work_orders.get(&app.owner, order_id).await.unwrap();
    assert_eq!(order.paid_total_cents, 6_000);
    assert_eq!(order.balance_cents, 4_000);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Partial);
}

/// Two payments racing for the same remaining balance never push the paid
/// total past the order total: the order row is locked before the ceiling
/// check, so whichever lands second sees the updated balance and is
/// rejected.
#[tokio::test]
async fn concurrent_payments_respect_the_ceiling() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 10_000).await;

    let cash_payment = payment(6_000, PaymentMethod::Cash);
    let card_payment = payment(6_000, PaymentMethod::Card);
    let first = app
        .payments
        .add_payment(&app.owner, order_id, &cash_payment);
    let second = app
        .payments
        .add_payment(&app.owner, order_id, &card_payment);
    let (first, second) = tokio::join!(first, second);

    // Exactly one of the two can fit under the ceiling.
    assert!(first.is_ok() != second.is_ok());
    let order = app.work_orders.get(&app.owner, order_id).await.unwrap();
    assert_eq!(order.paid_total_cents, 6_000);
    assert_eq!(order.balance_cents, 4_000);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Partial);
}

/// Zero and negative amounts never reach the ledger.
#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 5_000).await;

    for amount in [0, -500] {
        let err = app
            .payments
            .add_payment(&app.owner, order_id, &payment(amount, PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
    assert!(app
        .payments
        .list(&app.owner, order_id)
        .await
        .unwrap()
        .is_empty());
}

/// Removing the only payment reopens the full balance.
#[tokio::test]
async fn remove_payment_reopens_balance() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 1_000).await;

    let paid = app
        .payments
        .add_payment(&app.owner, order_id, &payment(1_000, PaymentMethod::Cash))
        .await
        .unwrap();

    let order = app.work_orders.get(&app.owner, order_id).await.unwrap();
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Paid);

    app.payments
        .remove_payment(&app.owner, paid.payment_id)
        .await
        .unwrap();

    let order = app.work_orders.get(&app.owner, order_id).await.unwrap();
    assert_eq!(order.paid_total_cents, 0);
    assert_eq!(order.balance_cents, 1_000);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Unpaid);
}

/// Staff may record payments but not remove them.
#[tokio::test]
async fn staff_cannot_remove_payments() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 2_000).await;

    let paid = app
        .payments
        .add_payment(&app.owner, order_id, &payment(2_000, PaymentMethod::Card))
        .await
        .unwrap();

    let err = app
        .payments
        .remove_payment(&app.staff, paid.payment_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // The payment survived the rejected removal.
    let order = app.work_orders.get(&app.owner, order_id).await.unwrap();
    assert_eq!(order.paid_total_cents, 2_000);
}

/// Every recorded payment leaves an append-only audit event.
#[tokio::test]
async fn payment_emits_audit_event() {
    let app = spawn_app().await;
    let order_id = order_with_total(&app, 3_000).await;

    let paid = app
        .payments
        .add_payment(
            &app.owner,
            order_id,
            &payment(3_000, PaymentMethod::Transfer),
        )
        .await
        .unwrap();

    let events = app
        .work_orders
        .list_events(&app.owner, order_id)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_type, WorkOrderEvent::PAYMENT_ADDED);
    let payload = event.payload.as_ref().unwrap();
    assert_eq!(payload["payment_id"], paid.payment_id.to_string());
    assert_eq!(payload["amount_cents"], 3_000);
    assert_eq!(payload["method"], "TRANSFER");
}
