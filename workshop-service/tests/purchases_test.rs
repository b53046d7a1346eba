//! Purchase receiving workflow.

mod common;

use common::{seed_part, seed_supplier, spawn_app, stock_of};
use service_core::error::AppError;
use workshop_service::models::{
    CreatePurchase, CreatePurchaseItem, MovementType, PurchaseStatus, ReferenceType, UpdatePurchase,
};

/// Receiving totals the lines, flips the status once, and lands one IN
/// movement per line. A second receive is rejected.
#[tokio::test]
async fn receive_emits_inbound_movements_once() {
    let app = spawn_app().await;
    let supplier = seed_supplier(&app).await;
    let part_a = seed_part(&app, 100, 300).await;
    let part_b = seed_part(&app, 200, 500).await;

    let detail = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: supplier.supplier_id,
                notes: None,
                items: vec![
                    CreatePurchaseItem {
                        catalog_item_id: part_a.catalog_item_id,
                        qty: 4,
                        unit_cost_cents: 100,
                    },
                    CreatePurchaseItem {
                        catalog_item_id: part_b.catalog_item_id,
                        qty: 2,
                        unit_cost_cents: 200,
                    },
                ],
            },
        )
        .await
        .unwrap();
    assert_eq!(detail.purchase.total_cents, 800);
    assert_eq!(detail.purchase.parsed_status(), PurchaseStatus::Draft);

    let received = app
        .purchases
        .receive(&app.owner, detail.purchase.purchase_id)
        .await
        .unwrap();
    assert_eq!(received.parsed_status(), PurchaseStatus::Received);
    assert!(received.received_utc.is_some());

    assert_eq!(stock_of(&app, part_a.catalog_item_id).await, 4);
    assert_eq!(stock_of(&app, part_b.catalog_item_id).await, 2);

    let movements = app
        .inventory
        .list_movements(&app.owner, part_a.catalog_item_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].parsed_type(), MovementType::In);
    assert_eq!(movements[0].parsed_reference_type(), ReferenceType::Purchase);
    assert_eq!(movements[0].unit_cost_cents, Some(100));

    let err = app
        .purchases
        .receive(&app.owner, detail.purchase.purchase_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    // No double-counted stock.
    assert_eq!(stock_of(&app, part_a.catalog_item_id).await, 4);
}

/// An empty purchase cannot be received.
#[tokio::test]
async fn receiving_empty_purchase_is_rejected() {
    let app = spawn_app().await;
    let supplier = seed_supplier(&app).await;

    let detail = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: supplier.supplier_id,
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap();

    let err = app
        .purchases
        .receive(&app.owner, detail.purchase.purchase_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

/// Lines can be added and removed freely before receipt; the total follows.
#[tokio::test]
async fn item_mutation_recomputes_total_until_received() {
    let app = spawn_app().await;
    let supplier = seed_supplier(&app).await;
    let part = seed_part(&app, 100, 300).await;

    let detail = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: supplier.supplier_id,
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap();
    let purchase_id = detail.purchase.purchase_id;

    let line = app
        .purchases
        .add_item(
            &app.owner,
            purchase_id,
            &CreatePurchaseItem {
                catalog_item_id: part.catalog_item_id,
                qty: 5,
                unit_cost_cents: 120,
            },
        )
        .await
        .unwrap();
    assert_eq!(line.line_total_cents, 600);

    let detail = app.purchases.get(&app.owner, purchase_id).await.unwrap();
    assert_eq!(detail.purchase.total_cents, 600);

    app.purchases
        .remove_item(&app.owner, purchase_id, line.item_id)
        .await
        .unwrap();
    let detail = app.purchases.get(&app.owner, purchase_id).await.unwrap();
    assert_eq!(detail.purchase.total_cents, 0);

    // Ordering a purchase keeps it editable.
    app.purchases
        .update(
            &app.owner,
            purchase_id,
            &UpdatePurchase {
                status: Some(PurchaseStatus::Ordered),
                notes: None,
            },
        )
        .await
        .unwrap();
    app.purchases
        .add_item(
            &app.owner,
            purchase_id,
            &CreatePurchaseItem {
                catalog_item_id: part.catalog_item_id,
                qty: 1,
                unit_cost_cents: 120,
            },
        )
        .await
        .unwrap();
}

/// RECEIVED freezes the purchase: no line edits, no status changes.
#[tokio::test]
async fn received_purchase_is_frozen() {
    let app = spawn_app().await;
    let supplier = seed_supplier(&app).await;
    let part = seed_part(&app, 100, 300).await;

    let detail = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: supplier.supplier_id,
                notes: None,
                items: vec![CreatePurchaseItem {
                    catalog_item_id: part.catalog_item_id,
                    qty: 1,
                    unit_cost_cents: 100,
                }],
            },
        )
        .await
        .unwrap();
    let purchase_id = detail.purchase.purchase_id;
    let line_id = detail.items[0].item_id;
    app.purchases.receive(&app.owner, purchase_id).await.unwrap();

    let err = app
        .purchases
        .add_item(
            &app.owner,
            purchase_id,
            &CreatePurchaseItem {
                catalog_item_id: part.catalog_item_id,
                qty: 1,
                unit_cost_cents: 100,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = app
        .purchases
        .remove_item(&app.owner, purchase_id, line_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = app
        .purchases
        .update(
            &app.owner,
            purchase_id,
            &UpdatePurchase {
                status: Some(PurchaseStatus::Canceled),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

/// Receiving must go through receive; a status update cannot smuggle a
/// purchase into RECEIVED with no movements.
#[tokio::test]
async fn update_cannot_set_received() {
    let app = spawn_app().await;
    let supplier = seed_supplier(&app).await;
    let part = seed_part(&app, 100, 300).await;

    let detail = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: supplier.supplier_id,
                notes: None,
                items: vec![CreatePurchaseItem {
                    catalog_item_id: part.catalog_item_id,
                    qty: 3,
                    unit_cost_cents: 100,
                }],
            },
        )
        .await
        .unwrap();

    let err = app
        .purchases
        .update(
            &app.owner,
            detail.purchase.purchase_id,
            &UpdatePurchase {
                status: Some(PurchaseStatus::Received),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&app, part.catalog_item_id).await, 0);
}

/// A purchase against an unknown supplier is rejected.
#[tokio::test]
async fn unknown_supplier_is_rejected() {
    let app = spawn_app().await;

    let err = app
        .purchases
        .create(
            &app.owner,
            &CreatePurchase {
                supplier_id: uuid::Uuid::new_v4(),
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(app.purchases.list(&app.owner).await.unwrap().is_empty());
}
