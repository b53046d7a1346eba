//! In-memory store for tests and local development.
//!
//! A transaction holds the single state mutex for its whole lifetime, so
//! units of work are serial by construction. `begin` snapshots the state;
//! dropping the transaction without commit restores the snapshot, which
//! gives the same all-or-nothing behavior as the PostgreSQL store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use service_core::error::AppError;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{
    CashClose, CatalogItem, CatalogItemType, Customer, InventoryMovement, ItemCostRow,
    ListWorkOrdersFilter, Payment, PaymentTotals, Purchase, PurchaseItem, StockLevel, Supplier,
    Vehicle, WorkOrder, WorkOrderEvent, WorkOrderItem, WorkOrderNote, WorkOrderTotals,
};

use super::{StoreTx, WorkshopStore};

#[derive(Debug, Clone, Default)]
struct MemState {
    customers: Vec<Customer>,
    vehicles: Vec<Vehicle>,
    catalog_items: Vec<CatalogItem>,
    suppliers: Vec<Supplier>,
    work_orders: Vec<WorkOrder>,
    work_order_items: Vec<WorkOrderItem>,
    work_order_notes: Vec<WorkOrderNote>,
    work_order_events: Vec<WorkOrderEvent>,
    movements: Vec<InventoryMovement>,
    payments: Vec<Payment>,
    purchases: Vec<Purchase>,
    purchase_items: Vec<PurchaseItem>,
    cash_closes: Vec<CashClose>,
}

/// In-memory store. Cheap to create, one independent world per instance.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkshopStore for MemStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = Some((*guard).clone());
        Ok(Box::new(MemTx { guard, snapshot }))
    }
}

/// One open in-memory transaction. The snapshot is restored on drop unless
/// the transaction committed.
pub struct MemTx {
    guard: OwnedMutexGuard<MemState>,
    snapshot: Option<MemState>,
}

impl Drop for MemTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl StoreTx for MemTx {
    // -------------------------------------------------------------------------
    // Customers & Vehicles
    // -------------------------------------------------------------------------

    async fn find_customer(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        Ok(self
            .guard
            .customers
            .iter()
            .find(|c| {
                c.tenant_id == tenant_id && c.owner_id == owner_id && c.customer_id == customer_id
            })
            .cloned())
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), AppError> {
        self.guard.customers.push(customer.clone());
        Ok(())
    }

    async fn find_vehicle(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Option<Vehicle>, AppError> {
        Ok(self
            .guard
            .vehicles
            .iter()
            .find(|v| {
                v.tenant_id == tenant_id && v.owner_id == owner_id && v.vehicle_id == vehicle_id
            })
            .cloned())
    }

    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), AppError> {
        self.guard.vehicles.push(vehicle.clone());
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Catalog & Suppliers
    // -------------------------------------------------------------------------

    async fn find_catalog_item(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Option<CatalogItem>, AppError> {
        Ok(self
            .guard
            .catalog_items
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.catalog_item_id == catalog_item_id)
            .cloned())
    }

    async fn insert_catalog_item(&mut self, item: &CatalogItem) -> Result<(), AppError> {
        self.guard.catalog_items.push(item.clone());
        Ok(())
    }

    async fn lock_catalog_item(
        &mut self,
        _tenant_id: Uuid,
        _catalog_item_id: Uuid,
    ) -> Result<(), AppError> {
        // The state mutex already serializes transactions.
        Ok(())
    }

    async fn find_supplier(
        &mut self,
        tenant_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Supplier>, AppError> {
        Ok(self
            .guard
            .suppliers
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.supplier_id == supplier_id)
            .cloned())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), AppError> {
        self.guard.suppliers.push(supplier.clone());
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Work Orders
    // -------------------------------------------------------------------------

    async fn insert_work_order(&mut self, order: &WorkOrder) -> Result<(), AppError> {
        self.guard.work_orders.push(order.clone());
        Ok(())
    }

    async fn find_work_order(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError> {
        Ok(self
            .guard
            .work_orders
            .iter()
            .find(|o| {
                o.tenant_id == tenant_id
                    && o.owner_id == owner_id
                    && o.work_order_id == work_order_id
            })
            .cloned())
    }

    async fn find_work_order_in_tenant(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError> {
        Ok(self
            .guard
            .work_orders
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.work_order_id == work_order_id)
            .cloned())
    }

    async fn lock_work_order(
        &mut self,
        _tenant_id: Uuid,
        _work_order_id: Uuid,
    ) -> Result<(), AppError> {
        // The state mutex already serializes transactions.
        Ok(())
    }

    async fn list_work_orders(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        filter: &ListWorkOrdersFilter,
    ) -> Result<Vec<WorkOrder>, AppError> {
        let mut orders: Vec<WorkOrder> = self
            .guard
            .work_orders
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.owner_id == owner_id)
            .filter(|o| filter.status.is_none_or(|s| o.status == s.as_str()))
            .filter(|o| filter.customer_id.is_none_or(|c| o.customer_id == c))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn update_work_order_head(&mut self, order: &WorkOrder) -> Result<(), AppError> {
        if let Some(slot) = self.guard.work_orders.iter_mut().find(|o| {
            o.tenant_id == order.tenant_id && o.work_order_id == order.work_order_id
        }) {
            slot.customer_id = order.customer_id;
            slot.vehicle_id = order.vehicle_id;
            slot.title = order.title.clone();
            slot.description = order.description.clone();
            slot.odometer_km = order.odometer_km;
            slot.status = order.status.clone();
            slot.updated_utc = order.updated_utc;
        }
        Ok(())
    }

    async fn update_work_order_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &WorkOrderTotals,
    ) -> Result<(), AppError> {
        if let Some(slot) = self
            .guard
            .work_orders
            .iter_mut()
            .find(|o| o.tenant_id == tenant_id && o.work_order_id == work_order_id)
        {
            slot.total_cents = totals.total_cents;
            slot.cost_total_cents = totals.cost_total_cents;
            slot.margin_cents = totals.margin_cents;
            slot.paid_total_cents = totals.paid_total_cents;
            slot.balance_cents = totals.balance_cents;
            slot.payment_status = totals.payment_status.as_str().to_string();
            slot.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn update_work_order_payment_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &PaymentTotals,
    ) -> Result<(), AppError> {
        if let Some(slot) = self
            .guard
            .work_orders
            .iter_mut()
            .find(|o| o.tenant_id == tenant_id && o.work_order_id == work_order_id)
        {
            slot.paid_total_cents = totals.paid_total_cents;
            slot.balance_cents = totals.balance_cents;
            slot.payment_status = totals.payment_status.as_str().to_string();
            slot.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn delete_work_order(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<(), AppError> {
        let state = &mut *self.guard;
        state
            .work_orders
            .retain(|o| !(o.tenant_id == tenant_id && o.work_order_id == work_order_id));
        // Mirrors the relational ON DELETE CASCADE.
        state
            .work_order_items
            .retain(|i| !(i.tenant_id == tenant_id && i.work_order_id == work_order_id));
        state
            .work_order_notes
            .retain(|n| !(n.tenant_id == tenant_id && n.work_order_id == work_order_id));
        state
            .work_order_events
            .retain(|e| !(e.tenant_id == tenant_id && e.work_order_id == work_order_id));
        state
            .payments
            .retain(|p| !(p.tenant_id == tenant_id && p.work_order_id == work_order_id));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Work Order Items
    // -------------------------------------------------------------------------

    async fn insert_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError> {
        self.guard.work_order_items.push(item.clone());
        Ok(())
    }

    async fn find_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<WorkOrderItem>, AppError> {
        Ok(self
            .guard
            .work_order_items
            .iter()
            .find(|i| {
                i.tenant_id == tenant_id
                    && i.work_order_id == work_order_id
                    && i.item_id == item_id
            })
            .cloned())
    }

    async fn list_work_order_items(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderItem>, AppError> {
        let mut items: Vec<WorkOrderItem> = self
            .guard
            .work_order_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.work_order_id == work_order_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        Ok(items)
    }

    async fn list_item_cost_rows(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<ItemCostRow>, AppError> {
        let state = &*self.guard;
        let rows = state
            .work_order_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.work_order_id == work_order_id)
            .map(|i| {
                let catalog_cost_cents = i.catalog_item_id.and_then(|id| {
                    state
                        .catalog_items
                        .iter()
                        .find(|c| c.tenant_id == tenant_id && c.catalog_item_id == id)
                        .map(|c| c.cost_cents)
                });
                ItemCostRow {
                    item_type: i.item_type.clone(),
                    qty: i.qty,
                    line_total_cents: i.line_total_cents,
                    catalog_cost_cents,
                }
            })
            .collect();
        Ok(rows)
    }

    async fn update_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError> {
        if let Some(slot) = self.guard.work_order_items.iter_mut().find(|i| {
            i.tenant_id == item.tenant_id
                && i.work_order_id == item.work_order_id
                && i.item_id == item.item_id
        }) {
            *slot = item.clone();
        }
        Ok(())
    }

    async fn delete_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        self.guard.work_order_items.retain(|i| {
            !(i.tenant_id == tenant_id && i.work_order_id == work_order_id && i.item_id == item_id)
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Notes & Audit Events
    // -------------------------------------------------------------------------

    async fn insert_work_order_note(&mut self, note: &WorkOrderNote) -> Result<(), AppError> {
        self.guard.work_order_notes.push(note.clone());
        Ok(())
    }

    async fn find_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<Option<WorkOrderNote>, AppError> {
        Ok(self
            .guard
            .work_order_notes
            .iter()
            .find(|n| {
                n.tenant_id == tenant_id
                    && n.work_order_id == work_order_id
                    && n.note_id == note_id
            })
            .cloned())
    }

    async fn list_work_order_notes(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderNote>, AppError> {
        let mut notes: Vec<WorkOrderNote> = self
            .guard
            .work_order_notes
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.work_order_id == work_order_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(notes)
    }

    async fn delete_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<(), AppError> {
        self.guard.work_order_notes.retain(|n| {
            !(n.tenant_id == tenant_id && n.work_order_id == work_order_id && n.note_id == note_id)
        });
        Ok(())
    }

    async fn append_work_order_event(&mut self, event: &WorkOrderEvent) -> Result<(), AppError> {
        self.guard.work_order_events.push(event.clone());
        Ok(())
    }

    async fn list_work_order_events(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderEvent>, AppError> {
        let mut events: Vec<WorkOrderEvent> = self
            .guard
            .work_order_events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.work_order_id == work_order_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        Ok(events)
    }

    // -------------------------------------------------------------------------
    // Inventory Ledger
    // -------------------------------------------------------------------------

    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), AppError> {
        self.guard.movements.push(movement.clone());
        Ok(())
    }

    async fn sum_movement_qty(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .guard
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.catalog_item_id == catalog_item_id)
            .map(|m| i64::from(m.qty))
            .sum())
    }

    async fn list_movements(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let mut movements: Vec<InventoryMovement> = self
            .guard
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.catalog_item_id == catalog_item_id)
            .cloned()
            .collect();
        movements.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(movements)
    }

    async fn list_stock_levels(&mut self, tenant_id: Uuid) -> Result<Vec<StockLevel>, AppError> {
        let state = &*self.guard;
        let mut levels: Vec<StockLevel> = state
            .catalog_items
            .iter()
            .filter(|c| {
                c.tenant_id == tenant_id && c.item_type == CatalogItemType::Part.as_str()
            })
            .map(|c| {
                let qty_on_hand = state
                    .movements
                    .iter()
                    .filter(|m| {
                        m.tenant_id == tenant_id && m.catalog_item_id == c.catalog_item_id
                    })
                    .map(|m| i64::from(m.qty))
                    .sum();
                StockLevel {
                    catalog_item_id: c.catalog_item_id,
                    name: c.name.clone(),
                    sku: c.sku.clone(),
                    cost_cents: c.cost_cents,
                    price_cents: c.price_cents,
                    is_active: c.is_active,
                    qty_on_hand,
                }
            })
            .collect();
        levels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(levels)
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.guard.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment(
        &mut self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self
            .guard
            .payments
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.payment_id == payment_id)
            .cloned())
    }

    async fn list_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .guard
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.work_order_id == work_order_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_utc.cmp(&a.paid_utc));
        Ok(payments)
    }

    async fn delete_payment(
        &mut self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), AppError> {
        self.guard
            .payments
            .retain(|p| !(p.tenant_id == tenant_id && p.payment_id == payment_id));
        Ok(())
    }

    async fn sum_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .guard
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.work_order_id == work_order_id)
            .map(|p| p.amount_cents)
            .sum())
    }

    async fn list_payments_in_window(
        &mut self,
        tenant_id: Uuid,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .guard
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.paid_utc >= from_utc && p.paid_utc < to_utc)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.paid_utc.cmp(&b.paid_utc));
        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Purchases
    // -------------------------------------------------------------------------

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError> {
        self.guard.purchases.push(purchase.clone());
        Ok(())
    }

    async fn find_purchase(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Option<Purchase>, AppError> {
        Ok(self
            .guard
            .purchases
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.purchase_id == purchase_id)
            .cloned())
    }

    async fn list_purchases(&mut self, tenant_id: Uuid) -> Result<Vec<Purchase>, AppError> {
        let mut purchases: Vec<Purchase> = self
            .guard
            .purchases
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(purchases)
    }

    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError> {
        if let Some(slot) = self.guard.purchases.iter_mut().find(|p| {
            p.tenant_id == purchase.tenant_id && p.purchase_id == purchase.purchase_id
        }) {
            *slot = purchase.clone();
        }
        Ok(())
    }

    async fn insert_purchase_item(&mut self, item: &PurchaseItem) -> Result<(), AppError> {
        self.guard.purchase_items.push(item.clone());
        Ok(())
    }

    async fn find_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<PurchaseItem>, AppError> {
        Ok(self
            .guard
            .purchase_items
            .iter()
            .find(|i| {
                i.tenant_id == tenant_id && i.purchase_id == purchase_id && i.item_id == item_id
            })
            .cloned())
    }

    async fn list_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseItem>, AppError> {
        let mut items: Vec<PurchaseItem> = self
            .guard
            .purchase_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.purchase_id == purchase_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        Ok(items)
    }

    async fn delete_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        self.guard.purchase_items.retain(|i| {
            !(i.tenant_id == tenant_id && i.purchase_id == purchase_id && i.item_id == item_id)
        });
        Ok(())
    }

    async fn sum_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .guard
            .purchase_items
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.purchase_id == purchase_id)
            .map(|i| i.line_total_cents)
            .sum())
    }

    // -------------------------------------------------------------------------
    // Cash Closes
    // -------------------------------------------------------------------------

    async fn find_cash_close(
        &mut self,
        tenant_id: Uuid,
        close_date: NaiveDate,
    ) -> Result<Option<CashClose>, AppError> {
        Ok(self
            .guard
            .cash_closes
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.close_date == close_date)
            .cloned())
    }

    async fn insert_cash_close(&mut self, close: &CashClose) -> Result<(), AppError> {
        // Same uniqueness rule the relational schema enforces.
        let exists = self
            .guard
            .cash_closes
            .iter()
            .any(|c| c.tenant_id == close.tenant_id && c.close_date == close.close_date);
        if exists {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cash close already exists for {}",
                close.close_date
            )));
        }
        self.guard.cash_closes.push(close.clone());
        Ok(())
    }

    async fn list_cash_closes(
        &mut self,
        tenant_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CashClose>, AppError> {
        let mut closes: Vec<CashClose> = self
            .guard
            .cash_closes
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| from.is_none_or(|d| c.close_date >= d))
            .filter(|c| to.is_none_or(|d| c.close_date <= d))
            .cloned()
            .collect();
        closes.sort_by(|a, b| b.close_date.cmp(&a.close_date));
        Ok(closes)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        self.snapshot = None;
        Ok(())
    }
}
