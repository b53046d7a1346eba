//! Common test utilities for workshop-service integration tests.
//!
//! Every test gets its own in-memory store, so suites run hermetically and
//! in parallel without a database.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::Utc;
use service_core::actor::{Actor, Role};
use uuid::Uuid;

use workshop_service::models::{
    CatalogItem, CatalogItemType, CreateWorkOrder, CreateWorkOrderItem, Customer,
    InventoryAdjustment, ItemType, Supplier, WorkOrder,
};
use workshop_service::services::{
    CashCloseService, InventoryService, PaymentService, PurchaseService, WorkOrderService,
};
use workshop_service::store::{MemStore, WorkshopStore};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workshop_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One isolated engine instance over a fresh in-memory store, with an
/// owner, an admin, and a staff actor in the same tenant.
pub struct TestApp {
    pub store: Arc<MemStore>,
    pub work_orders: WorkOrderService,
    pub payments: PaymentService,
    pub inventory: InventoryService,
    pub purchases: PurchaseService,
    pub cash_closes: CashCloseService,
    pub owner: Actor,
    pub admin: Actor,
    pub staff: Actor,
}

pub async fn spawn_app() -> TestApp {
    init_tracing();

    let tenant_id = Uuid::new_v4();
    let store = Arc::new(MemStore::new());
    let store_dyn: Arc<dyn workshop_service::store::WorkshopStore> = store.clone();

    TestApp {
        store,
        work_orders: WorkOrderService::new(store_dyn.clone()),
        payments: PaymentService::new(store_dyn.clone()),
        inventory: InventoryService::new(store_dyn.clone()),
        purchases: PurchaseService::new(store_dyn.clone()),
        cash_closes: CashCloseService::new(store_dyn),
        owner: Actor::new(Uuid::new_v4(), Role::Owner, tenant_id),
        admin: Actor::new(Uuid::new_v4(), Role::Admin, tenant_id),
        staff: Actor::new(Uuid::new_v4(), Role::Staff, tenant_id),
    }
}

/// Insert a customer owned by the given actor.
pub async fn seed_customer(app: &TestApp, actor: &Actor) -> Customer {
    let customer = Customer {
        customer_id: Uuid::new_v4(),
        tenant_id: actor.tenant_id,
        owner_id: actor.id,
        name: "Test Customer".to_string(),
        phone: None,
        email: None,
        created_utc: Utc::now(),
    };
    let mut tx = app.store.begin().await.expect("begin");
    tx.insert_customer(&customer).await.expect("seed customer");
    tx.commit().await.expect("commit seed");
    customer
}

/// Insert a PART catalog item with the given cost and price.
pub async fn seed_part(app: &TestApp, cost_cents: i64, price_cents: i64) -> CatalogItem {
    seed_catalog_item(app, CatalogItemType::Part, cost_cents, price_cents).await
}

/// Insert a catalog item of the given kind.
pub async fn seed_catalog_item(
    app: &TestApp,
    item_type: CatalogItemType,
    cost_cents: i64,
    price_cents: i64,
) -> CatalogItem {
    let item = CatalogItem {
        catalog_item_id: Uuid::new_v4(),
        tenant_id: app.owner.tenant_id,
        item_type: item_type.as_str().to_string(),
        name: format!("Item {}", Uuid::new_v4()),
        sku: None,
        price_cents,
        cost_cents,
        is_active: true,
        created_utc: Utc::now(),
    };
    let mut tx = app.store.begin().await.expect("begin");
    tx.insert_catalog_item(&item).await.expect("seed catalog");
    tx.commit().await.expect("commit seed");
    item
}

/// Insert a supplier for purchase tests.
pub async fn seed_supplier(app: &TestApp) -> Supplier {
    let supplier = Supplier {
        supplier_id: Uuid::new_v4(),
        tenant_id: app.owner.tenant_id,
        name: "Test Supplier".to_string(),
        phone: None,
        email: None,
        created_utc: Utc::now(),
    };
    let mut tx = app.store.begin().await.expect("begin");
    tx.insert_supplier(&supplier).await.expect("seed supplier");
    tx.commit().await.expect("commit seed");
    supplier
}

/// Bring an item's stock to the given level with one manual adjustment.
pub async fn seed_stock(app: &TestApp, catalog_item_id: Uuid, qty: i32) {
    app.inventory
        .adjust(
            &app.owner,
            &InventoryAdjustment {
                catalog_item_id,
                qty,
                reason: "initial stock".to_string(),
            },
        )
        .await
        .expect("seed stock");
}

/// Current derived stock of an item.
pub async fn stock_of(app: &TestApp, catalog_item_id: Uuid) -> i64 {
    app.inventory
        .current_stock(&app.owner, catalog_item_id)
        .await
        .expect("read stock")
}

/// Create an empty work order for the given actor's customer.
pub async fn seed_work_order(app: &TestApp, actor: &Actor) -> WorkOrder {
    let customer = seed_customer(app, actor).await;
    app.work_orders
        .create(
            actor,
            &CreateWorkOrder {
                customer_id: customer.customer_id,
                vehicle_id: None,
                title: "Brake service".to_string(),
                description: None,
                odometer_km: None,
                status: None,
            },
        )
        .await
        .expect("create work order")
}

/// Input for a LABOR line.
pub fn labor_item(name: &str, qty: i32, unit_price_cents: i64) -> CreateWorkOrderItem {
    CreateWorkOrderItem {
        item_type: ItemType::Labor,
        catalog_item_id: None,
        name: name.to_string(),
        qty,
        unit_price_cents,
    }
}

/// Input for a catalog-linked PART line.
pub fn part_item(catalog_item_id: Uuid, qty: i32, unit_price_cents: i64) -> CreateWorkOrderItem {
    CreateWorkOrderItem {
        item_type: ItemType::Part,
        catalog_item_id: Some(catalog_item_id),
        name: "Part line".to_string(),
        qty,
        unit_price_cents,
    }
}
