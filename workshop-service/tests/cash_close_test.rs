//! Daily cash close snapshots.

mod common;

use chrono::{Duration, Utc};
use common::{labor_item, seed_work_order, spawn_app};
use service_core::error::AppError;
use workshop_service::models::{CreateCashClose, CreatePayment, PaymentMethod};

async fn pay(app: &common::TestApp, amount_cents: i64, method: PaymentMethod) {
    let order = seed_work_order(app, &app.owner).await;
    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Service", 1, amount_cents),
        )
        .await
        .unwrap();
    app.payments
        .add_payment(
            &app.owner,
            order.work_order_id,
            &CreatePayment {
                amount_cents,
                method,
                reference: None,
            },
        )
        .await
        .unwrap();
}

/// Preview sums the day's payments by method without writing anything.
#[tokio::test]
async fn preview_sums_by_method() {
    let app = spawn_app().await;
    pay(&app, 5_000, PaymentMethod::Cash).await;
    pay(&app, 3_000, PaymentMethod::Card).await;
    pay(&app, 2_000, PaymentMethod::Transfer).await;
    pay(&app, 1_000, PaymentMethod::Cash).await;

    let today = Utc::now().date_naive();
    let totals = app.cash_closes.preview(&app.owner, today).await.unwrap();
    assert_eq!(totals.total_cents, 11_000);
    assert_eq!(totals.cash_cents, 6_000);
    assert_eq!(totals.card_cents, 3_000);
    assert_eq!(totals.transfer_cents, 2_000);
    assert_eq!(totals.payment_count, 4);

    assert!(app
        .cash_closes
        .list(&app.owner, None, None)
        .await
        .unwrap()
        .is_empty());
}

/// A day can only be closed once.
#[tokio::test]
async fn close_is_unique_per_day() {
    let app = spawn_app().await;
    pay(&app, 4_000, PaymentMethod::Cash).await;

    let today = Utc::now().date_naive();
    let close = app
        .cash_closes
        .create(
            &app.owner,
            &CreateCashClose {
                close_date: today,
                notes: Some("End of day".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(close.total_cents, 4_000);
    assert_eq!(close.cash_cents, 4_000);

    let err = app
        .cash_closes
        .create(
            &app.owner,
            &CreateCashClose {
                close_date: today,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let closes = app.cash_closes.list(&app.owner, None, None).await.unwrap();
    assert_eq!(closes.len(), 1);
}

/// Payments outside the day window do not count.
#[tokio::test]
async fn close_covers_only_its_day() {
    let app = spawn_app().await;
    pay(&app, 2_500, PaymentMethod::Card).await;

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let close = app
        .cash_closes
        .create(
            &app.owner,
            &CreateCashClose {
                close_date: yesterday,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(close.total_cents, 0);
    assert_eq!(close.card_cents, 0);
}

/// Staff are locked out of every cash close operation.
#[tokio::test]
async fn staff_are_locked_out() {
    let app = spawn_app().await;
    let today = Utc::now().date_naive();

    let err = app
        .cash_closes
        .preview(&app.staff, today)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .cash_closes
        .create(
            &app.staff,
            &CreateCashClose {
                close_date: today,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = app
        .cash_closes
        .list(&app.staff, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

/// The date-range filter bounds the listing.
#[tokio::test]
async fn list_respects_date_range() {
    let app = spawn_app().await;
    let today = Utc::now().date_naive();

    for days_back in 0..3 {
        app.cash_closes
            .create(
                &app.owner,
                &CreateCashClose {
                    close_date: today - Duration::days(days_back),
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let closes = app
        .cash_closes
        .list(&app.owner, Some(today - Duration::days(1)), Some(today))
        .await
        .unwrap();
    assert_eq!(closes.len(), 2);
    // Newest first.
    assert_eq!(closes[0].close_date, today);
}
