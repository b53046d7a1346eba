//! Inventory ledger behavior: derived stock, availability guards, and
//! manual adjustments.

mod common;

use common::{part_item, seed_catalog_item, seed_part, seed_stock, seed_work_order, spawn_app, stock_of};
use service_core::actor::{Actor, Role};
use service_core::error::AppError;
use uuid::Uuid;
use workshop_service::models::{CatalogItemType, InventoryAdjustment, UpdateWorkOrderItem};

/// Consuming from an empty ledger fails and records nothing.
#[tokio::test]
async fn add_item_with_zero_stock_is_rejected() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    let order = seed_work_order(&app, &app.owner).await;

    let err = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 2, 500),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(_)));

    assert_eq!(stock_of(&app, part.catalog_item_id).await, 0);
    let movements = app
        .inventory
        .list_movements(&app.owner, part.catalog_item_id)
        .await
        .unwrap();
    assert!(movements.is_empty());

    // The failed add left no line behind either.
    let order = app
        .work_orders
        .detail(&app.owner, order.work_order_id)
        .await
        .unwrap();
    assert!(order.items.is_empty());
    assert_eq!(order.work_order.total_cents, 0);
}

/// The add / grow / remove cycle from the consumption side: stock follows
/// the net quantity held by the line and returns in full on removal.
#[tokio::test]
async fn stock_follows_line_quantity() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    seed_stock(&app, part.catalog_item_id, 10).await;
    let order = seed_work_order(&app, &app.owner).await;

    let item = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 3, 500),
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 7);

    app.work_orders
        .update_item(
            &app.owner,
            order.work_order_id,
            item.item_id,
            &UpdateWorkOrderItem {
                qty: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 5);

    app.work_orders
        .remove_item(&app.owner, order.work_order_id, item.item_id)
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 10);
}

/// Shrinking a line returns only the delta.
#[tokio::test]
async fn quantity_decrease_returns_the_delta() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    seed_stock(&app, part.catalog_item_id, 10).await;
    let order = seed_work_order(&app, &app.owner).await;

    let item = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 6, 500),
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 4);

    app.work_orders
        .update_item(
            &app.owner,
            order.work_order_id,
            item.item_id,
            &UpdateWorkOrderItem {
                qty: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 8);
}

/// Relinking a line returns the old item's quantity and consumes from the
/// new item.
#[tokio::test]
async fn relink_moves_stock_between_items() {
    let app = spawn_app().await;
    let old_part = seed_part(&app, 100, 500).await;
    let new_part = seed_part(&app, 150, 700).await;
    seed_stock(&app, old_part.catalog_item_id, 5).await;
    seed_stock(&app, new_part.catalog_item_id, 5).await;
    let order = seed_work_order(&app, &app.owner).await;

    let item = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(old_part.catalog_item_id, 4, 500),
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, old_part.catalog_item_id).await, 1);

    app.work_orders
        .update_item(
            &app.owner,
            order.work_order_id,
            item.item_id,
            &UpdateWorkOrderItem {
                catalog_item_id: Some(Some(new_part.catalog_item_id)),
                qty: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&app, old_part.catalog_item_id).await, 5);
    assert_eq!(stock_of(&app, new_part.catalog_item_id).await, 2);
}

/// Clearing the catalog link returns the full held quantity.
#[tokio::test]
async fn unlink_returns_stock() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    seed_stock(&app, part.catalog_item_id, 5).await;
    let order = seed_work_order(&app, &app.owner).await;

    let item = app
        .work_orders
        .add_item(
            &app.owner,
            order.work_order_id,
            &part_item(part.catalog_item_id, 4, 500),
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 1);

    app.work_orders
        .update_item(
            &app.owner,
            order.work_order_id,
            item.item_id,
            &UpdateWorkOrderItem {
                catalog_item_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 5);
}

/// Manual adjustments move stock both ways but may not take it negative,
/// and a zero quantity is meaningless.
#[tokio::test]
async fn manual_adjustments_are_guarded() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    seed_stock(&app, part.catalog_item_id, 3).await;

    let err = app
        .inventory
        .adjust(
            &app.owner,
            &InventoryAdjustment {
                catalog_item_id: part.catalog_item_id,
                qty: 0,
                reason: "noop".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = app
        .inventory
        .adjust(
            &app.owner,
            &InventoryAdjustment {
                catalog_item_id: part.catalog_item_id,
                qty: -4,
                reason: "shrinkage".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(_)));
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 3);

    app.inventory
        .adjust(
            &app.owner,
            &InventoryAdjustment {
                catalog_item_id: part.catalog_item_id,
                qty: -3,
                reason: "shrinkage".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 0);
}

/// SERVICE catalog rows carry no stock and reject adjustment.
#[tokio::test]
async fn service_items_cannot_be_adjusted() {
    let app = spawn_app().await;
    let service = seed_catalog_item(&app, CatalogItemType::Service, 0, 4_000).await;

    let err = app
        .inventory
        .adjust(
            &app.owner,
            &InventoryAdjustment {
                catalog_item_id: service.catalog_item_id,
                qty: 5,
                reason: "wrong kind".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

/// An item is invisible outside its tenant.
#[tokio::test]
async fn tenant_scope_hides_foreign_items() {
    let app = spawn_app().await;
    let part = seed_part(&app, 100, 500).await;
    seed_stock(&app, part.catalog_item_id, 5).await;

    let outsider = Actor::new(Uuid::new_v4(), Role::Owner, Uuid::new_v4());
    let err = app
        .inventory
        .current_stock(&outsider, part.catalog_item_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// The stock listing derives quantities per PART item.
#[tokio::test]
async fn stock_listing_reflects_ledger() {
    let app = spawn_app().await;
    let part_a = seed_part(&app, 100, 500).await;
    let part_b = seed_part(&app, 200, 900).await;
    seed_stock(&app, part_a.catalog_item_id, 7).await;

    let levels = app.inventory.list_stock(&app.owner).await.unwrap();
    assert_eq!(levels.len(), 2);
    let qty_of = |id| {
        levels
            .iter()
            .find(|l| l.catalog_item_id == id)
            .map(|l| l.qty_on_hand)
            .unwrap()
    };
    assert_eq!(qty_of(part_a.catalog_item_id), 7);
    assert_eq!(qty_of(part_b.catalog_item_id), 0);
}
