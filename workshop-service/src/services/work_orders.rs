//! Work order operations: head CRUD, line items, notes and audit reads.
//!
//! Every mutating operation runs inside a single transaction that covers
//! the stock check, the movement append, the entity write and the derived
//! snapshot recompute. A failure anywhere rolls the whole operation back.

use std::sync::Arc;

use chrono::Utc;
use service_core::actor::Actor;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CatalogItem, CatalogItemType, CreateWorkOrder, CreateWorkOrderItem, CreateWorkOrderNote,
    ItemType, ListWorkOrdersFilter, MovementRef, MovementType, PaymentStatus, UpdateWorkOrder,
    UpdateWorkOrderItem, WorkOrder, WorkOrderDetail, WorkOrderEvent, WorkOrderItem, WorkOrderNote,
    WorkOrderStatus, WorkOrderTotals,
};
use crate::services::authz;
use crate::services::inventory::{ensure_stock_available, record_movement};
use crate::services::reconciliation::{self, checked_line_total};
use crate::store::{StoreTx, WorkshopStore};

/// Owner-scoped work order lookup shared by every operation below.
async fn load_order(
    tx: &mut dyn StoreTx,
    actor: &Actor,
    work_order_id: Uuid,
) -> Result<WorkOrder, AppError> {
    tx.find_work_order(actor.tenant_id, actor.id, work_order_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Work order {} not found", work_order_id))
        })
}

/// Tenant-scoped catalog lookup constrained to PART rows. A SERVICE row and
/// a missing row both come back as NotFound.
async fn resolve_catalog_part(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    catalog_item_id: Uuid,
) -> Result<CatalogItem, AppError> {
    tx.find_catalog_item(tenant_id, catalog_item_id)
        .await?
        .filter(|item| item.parsed_type() == CatalogItemType::Part)
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Catalog part {} not found", catalog_item_id))
        })
}

/// Work order head, item and note operations.
#[derive(Clone)]
pub struct WorkOrderService {
    store: Arc<dyn WorkshopStore>,
}

impl WorkOrderService {
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------------
    // Head Operations
    // -------------------------------------------------------------------------

    /// Create a work order. Derived monetary fields start at zero; only the
    /// recompute writes them afterwards.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, customer_id = %input.customer_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreateWorkOrder,
    ) -> Result<WorkOrder, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;

        tx.find_customer(actor.tenant_id, actor.id, input.customer_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Customer {} not found", input.customer_id))
            })?;

        if let Some(vehicle_id) = input.vehicle_id {
            let vehicle = tx
                .find_vehicle(actor.tenant_id, actor.id, vehicle_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Vehicle {} not found", vehicle_id))
                })?;
            if vehicle.customer_id != input.customer_id {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Vehicle {} does not belong to customer {}",
                    vehicle_id,
                    input.customer_id
                )));
            }
        }

        let now = Utc::now();
        let order = WorkOrder {
            work_order_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            owner_id: actor.id,
            customer_id: input.customer_id,
            vehicle_id: input.vehicle_id,
            title: input.title.clone(),
            description: input.description.clone(),
            odometer_km: input.odometer_km,
            status: input
                .status
                .unwrap_or(WorkOrderStatus::Open)
                .as_str()
                .to_string(),
            total_cents: 0,
            cost_total_cents: 0,
            margin_cents: 0,
            paid_total_cents: 0,
            balance_cents: 0,
            payment_status: PaymentStatus::Unpaid.as_str().to_string(),
            created_utc: now,
            updated_utc: now,
        };
        tx.insert_work_order(&order).await?;
        tx.commit().await?;

        info!(work_order_id = %order.work_order_id, "Work order created");
        Ok(order)
    }

    /// Fetch one work order in the actor's owner scope.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn get(&self, actor: &Actor, work_order_id: Uuid) -> Result<WorkOrder, AppError> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Work order with its items, payments and notes.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn detail(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<WorkOrderDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let work_order = load_order(&mut *tx, actor, work_order_id).await?;
        let items = tx
            .list_work_order_items(actor.tenant_id, work_order_id)
            .await?;
        let payments = tx.list_payments(actor.tenant_id, work_order_id).await?;
        let notes = tx
            .list_work_order_notes(actor.tenant_id, work_order_id)
            .await?;
        tx.commit().await?;
        Ok(WorkOrderDetail {
            work_order,
            items,
            payments,
            notes,
        })
    }

    /// List work orders in the actor's owner scope, newest first.
    #[instrument(skip(self, actor, filter), fields(tenant_id = %actor.tenant_id))]
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &ListWorkOrdersFilter,
    ) -> Result<Vec<WorkOrder>, AppError> {
        let mut tx = self.store.begin().await?;
        let orders = tx
            .list_work_orders(actor.tenant_id, actor.id, filter)
            .await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// Update head fields. The derived monetary columns are not reachable
    /// from here; any of the four status values may be written.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: &UpdateWorkOrder,
    ) -> Result<WorkOrder, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let mut order = load_order(&mut *tx, actor, work_order_id).await?;

        if let Some(vehicle_id) = input.vehicle_id {
            let vehicle = tx
                .find_vehicle(actor.tenant_id, actor.id, vehicle_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Vehicle {} not found", vehicle_id))
                })?;
            if vehicle.customer_id != order.customer_id {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Vehicle {} does not belong to customer {}",
                    vehicle_id,
                    order.customer_id
                )));
            }
            order.vehicle_id = Some(vehicle_id);
        }
        if let Some(title) = &input.title {
            order.title = title.clone();
        }
        if let Some(description) = &input.description {
            order.description = Some(description.clone());
        }
        if let Some(odometer_km) = input.odometer_km {
            order.odometer_km = Some(odometer_km);
        }
        if let Some(status) = input.status {
            order.status = status.as_str().to_string();
        }
        order.updated_utc = Utc::now();

        tx.update_work_order_head(&order).await?;
        tx.commit().await?;

        info!(
            work_order_id = %order.work_order_id,
            status = %order.status,
            "Work order updated"
        );
        Ok(order)
    }

    /// Delete an OPEN work order, returning stock for its catalog-linked
    /// lines. Orders past OPEN keep their history.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn remove(&self, actor: &Actor, work_order_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;

        if order.parsed_status() != WorkOrderStatus::Open {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only OPEN work orders can be deleted"
            )));
        }

        let items = tx
            .list_work_order_items(actor.tenant_id, work_order_id)
            .await?;
        let mut returned = 0;
        for item in &items {
            if let Some(catalog_item_id) = item.catalog_item_id {
                record_movement(
                    &mut *tx,
                    actor,
                    catalog_item_id,
                    MovementType::In,
                    item.qty,
                    None,
                    MovementRef::WorkOrder(work_order_id),
                )
                .await?;
                returned += 1;
            }
        }

        tx.delete_work_order(actor.tenant_id, work_order_id).await?;
        tx.commit().await?;

        info!(
            work_order_id = %work_order_id,
            returned_movements = returned,
            "Work order deleted"
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Line Items
    // -------------------------------------------------------------------------

    /// Add a line, consuming stock when catalog-linked.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn add_item(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: &CreateWorkOrderItem,
    ) -> Result<WorkOrderItem, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;
        authz::ensure_items_editable(actor, order.parsed_status())?;

        if input.catalog_item_id.is_some() && input.item_type != ItemType::Part {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only PART lines may reference a catalog item"
            )));
        }
        if let Some(catalog_item_id) = input.catalog_item_id {
            resolve_catalog_part(&mut *tx, actor.tenant_id, catalog_item_id).await?;
            ensure_stock_available(
                &mut *tx,
                actor.tenant_id,
                catalog_item_id,
                i64::from(input.qty),
            )
            .await?;
        }

        let line_total_cents = checked_line_total(input.qty, input.unit_price_cents)?;
        let item = WorkOrderItem {
            item_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            work_order_id,
            catalog_item_id: input.catalog_item_id,
            item_type: input.item_type.as_str().to_string(),
            name: input.name.clone(),
            qty: input.qty,
            unit_price_cents: input.unit_price_cents,
            line_total_cents,
            created_utc: Utc::now(),
        };
        tx.insert_work_order_item(&item).await?;

        if let Some(catalog_item_id) = input.catalog_item_id {
            record_movement(
                &mut *tx,
                actor,
                catalog_item_id,
                MovementType::Out,
                -input.qty,
                None,
                MovementRef::WorkOrder(work_order_id),
            )
            .await?;
        }

        reconciliation::recalculate(&mut *tx, actor.tenant_id, work_order_id).await?;
        tx.commit().await?;

        info!(
            item_id = %item.item_id,
            item_type = %item.item_type,
            "Work order item added"
        );
        Ok(item)
    }

    /// Patch a line, reconciling inventory along with money. By case: same
    /// catalog link with a quantity delta moves only the delta; a link
    /// change returns the old quantity first, then checks and consumes the
    /// new one.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        item_id: Uuid,
        input: &UpdateWorkOrderItem,
    ) -> Result<WorkOrderItem, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;
        authz::ensure_items_editable(actor, order.parsed_status())?;

        let item = tx
            .find_work_order_item(actor.tenant_id, work_order_id, item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Work order item {} not found", item_id))
            })?;

        let next_type = input.item_type.unwrap_or_else(|| item.parsed_type());
        let next_link = match input.catalog_item_id {
            Some(next) => next,
            None => item.catalog_item_id,
        };
        let next_qty = input.qty.unwrap_or(item.qty);
        let next_price = input.unit_price_cents.unwrap_or(item.unit_price_cents);
        let next_name = input.name.clone().unwrap_or_else(|| item.name.clone());

        if next_link.is_some() && next_type != ItemType::Part {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only PART lines may reference a catalog item"
            )));
        }
        if let Some(catalog_item_id) = next_link {
            resolve_catalog_part(&mut *tx, actor.tenant_id, catalog_item_id).await?;
        }

        let line_total_cents = checked_line_total(next_qty, next_price)?;

        match (item.catalog_item_id, next_link) {
            (Some(old_id), Some(new_id)) if old_id == new_id => {
                let delta = next_qty - item.qty;
                if delta > 0 {
                    ensure_stock_available(&mut *tx, actor.tenant_id, old_id, i64::from(delta))
                        .await?;
                    record_movement(
                        &mut *tx,
                        actor,
                        old_id,
                        MovementType::Out,
                        -delta,
                        None,
                        MovementRef::WorkOrder(work_order_id),
                    )
                    .await?;
                } else if delta < 0 {
                    record_movement(
                        &mut *tx,
                        actor,
                        old_id,
                        MovementType::In,
                        -delta,
                        None,
                        MovementRef::WorkOrder(work_order_id),
                    )
                    .await?;
                }
            }
            (old_link, new_link) => {
                if let Some(old_id) = old_link {
                    record_movement(
                        &mut *tx,
                        actor,
                        old_id,
                        MovementType::In,
                        item.qty,
                        None,
                        MovementRef::WorkOrder(work_order_id),
                    )
                    .await?;
                }
                if let Some(new_id) = new_link {
                    ensure_stock_available(&mut *tx, actor.tenant_id, new_id, i64::from(next_qty))
                        .await?;
                    record_movement(
                        &mut *tx,
                        actor,
                        new_id,
                        MovementType::Out,
                        -next_qty,
                        None,
                        MovementRef::WorkOrder(work_order_id),
                    )
                    .await?;
                }
            }
        }

        let updated = WorkOrderItem {
            item_id: item.item_id,
            tenant_id: item.tenant_id,
            work_order_id: item.work_order_id,
            catalog_item_id: next_link,
            item_type: next_type.as_str().to_string(),
            name: next_name,
            qty: next_qty,
            unit_price_cents: next_price,
            line_total_cents,
            created_utc: item.created_utc,
        };
        tx.update_work_order_item(&updated).await?;

        reconciliation::recalculate(&mut *tx, actor.tenant_id, work_order_id).await?;
        tx.commit().await?;

        info!(item_id = %item_id, "Work order item updated");
        Ok(updated)
    }

    /// Remove a line, returning stock when catalog-linked.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;
        authz::ensure_items_editable(actor, order.parsed_status())?;

        let item = tx
            .find_work_order_item(actor.tenant_id, work_order_id, item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Work order item {} not found", item_id))
            })?;

        if let Some(catalog_item_id) = item.catalog_item_id {
            record_movement(
                &mut *tx,
                actor,
                catalog_item_id,
                MovementType::In,
                item.qty,
                None,
                MovementRef::WorkOrder(work_order_id),
            )
            .await?;
        }

        tx.delete_work_order_item(actor.tenant_id, work_order_id, item_id)
            .await?;
        reconciliation::recalculate(&mut *tx, actor.tenant_id, work_order_id).await?;
        tx.commit().await?;

        info!(item_id = %item_id, "Work order item removed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Notes & Audit Events
    // -------------------------------------------------------------------------

    /// Attach a note to a work order.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn add_note(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: &CreateWorkOrderNote,
    ) -> Result<WorkOrderNote, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;

        let note = WorkOrderNote {
            note_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            work_order_id,
            body: input.body.clone(),
            created_by_user_id: actor.id,
            created_utc: Utc::now(),
        };
        tx.insert_work_order_note(&note).await?;
        tx.commit().await?;
        Ok(note)
    }

    /// Notes on a work order, newest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn list_notes(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderNote>, AppError> {
        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;
        let notes = tx
            .list_work_order_notes(actor.tenant_id, work_order_id)
            .await?;
        tx.commit().await?;
        Ok(notes)
    }

    /// Delete one note.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id, note_id = %note_id))]
    pub async fn remove_note(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;
        tx.find_work_order_note(actor.tenant_id, work_order_id, note_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Note {} not found", note_id)))?;
        tx.delete_work_order_note(actor.tenant_id, work_order_id, note_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Audit events for a work order, oldest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn list_events(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderEvent>, AppError> {
        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;
        let events = tx
            .list_work_order_events(actor.tenant_id, work_order_id)
            .await?;
        tx.commit().await?;
        Ok(events)
    }

    /// Rebuild the derived snapshot on demand. Idempotent: with no
    /// intervening mutation a second call produces identical values.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn recalculate(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<WorkOrderTotals, AppError> {
        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;
        let totals = reconciliation::recalculate(&mut *tx, actor.tenant_id, work_order_id).await?;
        tx.commit().await?;
        Ok(totals)
    }
}
