//! Storage abstraction for the engine.
//!
//! Every engine operation runs against a [`StoreTx`] unit of work obtained
//! from [`WorkshopStore::begin`]; the transaction handle is threaded
//! explicitly through stock checks, ledger appends, and the recompute. A
//! `StoreTx` dropped without [`StoreTx::commit`] rolls back, which is how a
//! failed operation leaves no partial writes.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CashClose, CatalogItem, Customer, InventoryMovement, ItemCostRow, ListWorkOrdersFilter,
    Payment, PaymentTotals, Purchase, PurchaseItem, StockLevel, Supplier, Vehicle, WorkOrder,
    WorkOrderEvent, WorkOrderItem, WorkOrderNote, WorkOrderTotals,
};

pub use memory::MemStore;
pub use postgres::PgStore;

/// A store that can open transactional units of work.
#[async_trait]
pub trait WorkshopStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

/// One open transaction. All reads observe a consistent snapshot; all
/// writes become visible together at commit. Every method is scoped by
/// `tenant_id` (and `owner_id` where the entity is owner-scoped).
#[async_trait]
pub trait StoreTx: Send {
    // -------------------------------------------------------------------------
    // Customers & Vehicles
    // -------------------------------------------------------------------------

    async fn find_customer(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError>;

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), AppError>;

    async fn find_vehicle(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Option<Vehicle>, AppError>;

    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Catalog & Suppliers
    // -------------------------------------------------------------------------

    async fn find_catalog_item(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Option<CatalogItem>, AppError>;

    async fn insert_catalog_item(&mut self, item: &CatalogItem) -> Result<(), AppError>;

    /// Take a row-level lock on the catalog item so that concurrent
    /// consumers of the same item serialize around the check-then-append
    /// pair. A no-op for backends whose transactions are already serial.
    async fn lock_catalog_item(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<(), AppError>;

    async fn find_supplier(
        &mut self,
        tenant_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Supplier>, AppError>;

    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Work Orders
    // -------------------------------------------------------------------------

    async fn insert_work_order(&mut self, order: &WorkOrder) -> Result<(), AppError>;

    async fn find_work_order(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError>;

    /// Tenant-wide lookup without the owner filter, for operations that are
    /// only tenant-scoped (payment removal, cash close aggregation).
    async fn find_work_order_in_tenant(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError>;

    /// Take a row-level lock on the work order so that concurrent payment
    /// mutations serialize around the balance check. A no-op for backends
    /// whose transactions are already serial.
    async fn lock_work_order(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<(), AppError>;

    async fn list_work_orders(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        filter: &ListWorkOrdersFilter,
    ) -> Result<Vec<WorkOrder>, AppError>;

    /// Update head fields (customer, vehicle, title, description, odometer,
    /// status). Derived monetary columns are untouched.
    async fn update_work_order_head(&mut self, order: &WorkOrder) -> Result<(), AppError>;

    /// Persist a full recompute result.
    async fn update_work_order_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &WorkOrderTotals,
    ) -> Result<(), AppError>;

    /// Persist a payments-only recompute result.
    async fn update_work_order_payment_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &PaymentTotals,
    ) -> Result<(), AppError>;

    /// Delete the order and its dependent rows (items, notes, events,
    /// payments). Inventory movements are not touched.
    async fn delete_work_order(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Work Order Items
    // -------------------------------------------------------------------------

    async fn insert_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError>;

    async fn find_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<WorkOrderItem>, AppError>;

    async fn list_work_order_items(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderItem>, AppError>;

    /// Lines joined to their resolved catalog cost, for the recompute.
    async fn list_item_cost_rows(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<ItemCostRow>, AppError>;

    async fn update_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError>;

    async fn delete_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Notes & Audit Events
    // -------------------------------------------------------------------------

    async fn insert_work_order_note(&mut self, note: &WorkOrderNote) -> Result<(), AppError>;

    async fn find_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<Option<WorkOrderNote>, AppError>;

    async fn list_work_order_notes(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderNote>, AppError>;

    async fn delete_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<(), AppError>;

    async fn append_work_order_event(&mut self, event: &WorkOrderEvent) -> Result<(), AppError>;

    async fn list_work_order_events(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderEvent>, AppError>;

    // -------------------------------------------------------------------------
    // Inventory Ledger
    // -------------------------------------------------------------------------

    /// Append one movement row. The ledger is insert-only; there is no
    /// update or delete counterpart.
    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), AppError>;

    /// Signed sum of movement quantities for one item: the derived stock.
    async fn sum_movement_qty(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<i64, AppError>;

    async fn list_movements(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Vec<InventoryMovement>, AppError>;

    async fn list_stock_levels(&mut self, tenant_id: Uuid) -> Result<Vec<StockLevel>, AppError>;

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError>;

    async fn find_payment(
        &mut self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError>;

    async fn list_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>;

    async fn delete_payment(&mut self, tenant_id: Uuid, payment_id: Uuid)
        -> Result<(), AppError>;

    async fn sum_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<i64, AppError>;

    /// Payments whose `paid_utc` falls in `[from_utc, to_utc)`, for the
    /// daily cash close.
    async fn list_payments_in_window(
        &mut self,
        tenant_id: Uuid,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError>;

    // -------------------------------------------------------------------------
    // Purchases
    // -------------------------------------------------------------------------

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError>;

    async fn find_purchase(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Option<Purchase>, AppError>;

    async fn list_purchases(&mut self, tenant_id: Uuid) -> Result<Vec<Purchase>, AppError>;

    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError>;

    async fn insert_purchase_item(&mut self, item: &PurchaseItem) -> Result<(), AppError>;

    async fn find_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<PurchaseItem>, AppError>;

    async fn list_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseItem>, AppError>;

    async fn delete_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>;

    async fn sum_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<i64, AppError>;

    // -------------------------------------------------------------------------
    // Cash Closes
    // -------------------------------------------------------------------------

    async fn find_cash_close(
        &mut self,
        tenant_id: Uuid,
        close_date: NaiveDate,
    ) -> Result<Option<CashClose>, AppError>;

    async fn insert_cash_close(&mut self, close: &CashClose) -> Result<(), AppError>;

    async fn list_cash_closes(
        &mut self,
        tenant_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CashClose>, AppError>;

    /// Commit the unit of work. Dropping an uncommitted transaction rolls
    /// it back.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
