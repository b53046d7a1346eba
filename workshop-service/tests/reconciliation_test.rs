//! Reconciliation of the work order monetary snapshot.

mod common;

use common::{labor_item, part_item, seed_part, seed_stock, seed_work_order, spawn_app};
use workshop_service::models::{CreatePayment, PaymentMethod, PaymentStatus, UpdateWorkOrderItem};

/// A labor-only order totals its lines, owes the full amount, and flips to
/// PAID when the balance is settled in full.
#[tokio::test]
async fn labor_order_paid_in_full() {
    let app = spawn_app().await;
    let order = seed_work_order(&app, &app.owner).await;

    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Diagnostics", 1, 5_000),
        )
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(order.total_cents, 5_000);
    assert_eq!(order.balance_cents, 5_000);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Unpaid);

    app.payments
        .add_payment(
            &app.owner,
            order.work_order_id,
            &CreatePayment {
                amount_cents: 5_000,
                method: PaymentMethod::Cash,
                reference: None,
            },
        )
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(order.paid_total_cents, 5_000);
    assert_eq!(order.balance_cents, 0);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Paid);
}

/// Cost accrues only on PART lines with a resolvable catalog cost; margin
/// is total minus cost.
#[tokio::test]
async fn cost_and_margin_from_part_lines() {
    let app = spawn_app().await;
    let part = seed_part(&app, 600, 1_000).await;
    seed_stock(&app, part.catalog_item_id, 10).await;
    let order = seed_work_order(&app, &app.owner).await;

    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 3, 1_000),
        )
        .await
        .unwrap();
    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Fitting", 2, 2_500),
        )
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    // 3 x 1000 parts + 2 x 2500 labor
    assert_eq!(order.total_cents, 8_000);
    // Only the part line carries cost: 3 x 600
    assert_eq!(order.cost_total_cents, 1_800);
    assert_eq!(order.margin_cents, 6_200);
}

/// An unlinked PART line contributes price but no cost.
#[tokio::test]
async fn unlinked_part_line_has_zero_cost() {
    let app = spawn_app().await;
    let order = seed_work_order(&app, &app.owner).await;

    let mut input = labor_item("Gasket (customer supplied)", 2, 900);
    input.item_type = workshop_service::models::ItemType::Part;
    app.work_orders
        .add_item(&app.owner, order.work_order_id, &input)
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(order.total_cents, 1_800);
    assert_eq!(order.cost_total_cents, 0);
    assert_eq!(order.margin_cents, 1_800);
}

/// Recomputing with no intervening mutation yields identical values.
#[tokio::test]
async fn recalculate_is_idempotent() {
    let app = spawn_app().await;
    let part = seed_part(&app, 300, 750).await;
    seed_stock(&app, part.catalog_item_id, 5).await;
    let order = seed_work_order(&app, &app.owner).await;

    app.work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 2, 750),
        )
        .await
        .unwrap();

    let first = app
        .work_orders
        .recalculate(&app.owner, order.work_order_id)
        .await
        .unwrap();
    let second = app
        .work_orders
        .recalculate(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(first, second);
}

/// Removing an item after payment can push paid above total; the balance
/// clamps at zero and the order stays PAID.
#[tokio::test]
async fn balance_clamps_when_items_shrink_below_paid() {
    let app = spawn_app().await;
    let order = seed_work_order(&app, &app.owner).await;

    let kept = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Base service", 1, 4_000),
        )
        .await
        .unwrap();
    let removed = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Extra work", 1, 2_000),
        )
        .await
        .unwrap();

    app.payments
        .add_payment(
            &app.owner,
            order.work_order_id,
            &CreatePayment {
                amount_cents: 6_000,
                method: PaymentMethod::Card,
                reference: None,
            },
        )
        .await
        .unwrap();

    app.work_orders
        .remove_item(&app.owner, order.work_order_id, removed.item_id)
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(order.total_cents, 4_000);
    assert_eq!(order.paid_total_cents, 6_000);
    assert_eq!(order.balance_cents, 0);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Paid);
    assert_eq!(kept.line_total_cents, 4_000);
}

/// Repricing a line through update_item flows into the snapshot.
#[tokio::test]
async fn item_update_reprices_order() {
    let app = spawn_app().await;
    let order = seed_work_order(&app, &app.owner).await;

    let item = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &labor_item("Alignment", 1, 3_000),
        )
        .await
        .unwrap();

    app.work_orders
        .update_item(
            &app.owner,
            order.work_order_id,
            item.item_id,
            &UpdateWorkOrderItem {
                qty: Some(2),
                unit_price_cents: Some(3_500),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let order = app
        .work_orders
        .get(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert_eq!(order.total_cents, 7_000);
    assert_eq!(order.balance_cents, 7_000);
    assert_eq!(order.parsed_payment_status(), PaymentStatus::Unpaid);
}
