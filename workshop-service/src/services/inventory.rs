//! Inventory operations over the append-only movement ledger.
//!
//! Stock is never stored as a counter. Consumers call
//! [`ensure_stock_available`] and then [`record_movement`] inside one
//! transaction; the ledger sum is the only source of truth.

use std::sync::Arc;

use chrono::Utc;
use service_core::actor::Actor;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CatalogItemType, InventoryAdjustment, InventoryMovement, MovementRef, MovementType, StockLevel,
};
use crate::services::metrics::{INSUFFICIENT_STOCK_TOTAL, MOVEMENTS_TOTAL};
use crate::store::{StoreTx, WorkshopStore};

// -------------------------------------------------------------------------
// Transaction-level ledger helpers
// -------------------------------------------------------------------------

/// Current stock of one item: the signed sum of its movements.
pub async fn current_stock(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    catalog_item_id: Uuid,
) -> Result<i64, AppError> {
    tx.sum_movement_qty(tenant_id, catalog_item_id).await
}

/// Check-then-consume guard. Locks the catalog row first so two
/// transactions cannot both pass the check and oversell the same item.
pub async fn ensure_stock_available(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    catalog_item_id: Uuid,
    qty_needed: i64,
) -> Result<(), AppError> {
    tx.lock_catalog_item(tenant_id, catalog_item_id).await?;
    let available = tx.sum_movement_qty(tenant_id, catalog_item_id).await?;
    if available < qty_needed {
        INSUFFICIENT_STOCK_TOTAL.inc();
        return Err(AppError::InsufficientStock(anyhow::anyhow!(
            "Insufficient stock for item {}: available {}, requested {}",
            catalog_item_id,
            available,
            qty_needed
        )));
    }
    Ok(())
}

/// Append one signed movement row within the caller's transaction.
pub async fn record_movement(
    tx: &mut dyn StoreTx,
    actor: &Actor,
    catalog_item_id: Uuid,
    movement_type: MovementType,
    qty: i32,
    unit_cost_cents: Option<i64>,
    reference: MovementRef,
) -> Result<InventoryMovement, AppError> {
    let movement = InventoryMovement {
        movement_id: Uuid::new_v4(),
        tenant_id: actor.tenant_id,
        catalog_item_id,
        movement_type: movement_type.as_str().to_string(),
        qty,
        unit_cost_cents,
        reference_type: reference.reference_type().as_str().to_string(),
        reference_id: reference.reference_id(),
        created_by_user_id: actor.id,
        created_utc: Utc::now(),
    };
    tx.append_movement(&movement).await?;
    MOVEMENTS_TOTAL
        .with_label_values(&[movement_type.as_str()])
        .inc();
    Ok(movement)
}

// -------------------------------------------------------------------------
// Service
// -------------------------------------------------------------------------

/// Read and adjustment operations over the ledger.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn WorkshopStore>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    /// Stock levels for every PART catalog item of the tenant.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id))]
    pub async fn list_stock(&self, actor: &Actor) -> Result<Vec<StockLevel>, AppError> {
        let mut tx = self.store.begin().await?;
        let levels = tx.list_stock_levels(actor.tenant_id).await?;
        tx.commit().await?;
        Ok(levels)
    }

    /// Movement history for one catalog item, newest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, catalog_item_id = %catalog_item_id))]
    pub async fn list_movements(
        &self,
        actor: &Actor,
        catalog_item_id: Uuid,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_catalog_item(actor.tenant_id, catalog_item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Catalog item {} not found", catalog_item_id))
            })?;
        let movements = tx.list_movements(actor.tenant_id, catalog_item_id).await?;
        tx.commit().await?;
        Ok(movements)
    }

    /// Derived stock for one catalog item.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, catalog_item_id = %catalog_item_id))]
    pub async fn current_stock(
        &self,
        actor: &Actor,
        catalog_item_id: Uuid,
    ) -> Result<i64, AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_catalog_item(actor.tenant_id, catalog_item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Catalog item {} not found", catalog_item_id))
            })?;
        let stock = current_stock(&mut *tx, actor.tenant_id, catalog_item_id).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Manual stock correction. Negative adjustments are guarded like any
    /// other consumption, so the ledger sum cannot go below zero.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, catalog_item_id = %input.catalog_item_id))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        input: &InventoryAdjustment,
    ) -> Result<InventoryMovement, AppError> {
        input.validate()?;
        if input.qty == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Adjustment quantity must be nonzero"
            )));
        }

        let mut tx = self.store.begin().await?;

        let item = tx
            .find_catalog_item(actor.tenant_id, input.catalog_item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Catalog item {} not found",
                    input.catalog_item_id
                ))
            })?;
        if item.parsed_type() != CatalogItemType::Part {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only PART items carry stock"
            )));
        }

        if input.qty < 0 {
            let qty_needed = i64::from(input.qty).abs();
            ensure_stock_available(&mut *tx, actor.tenant_id, input.catalog_item_id, qty_needed)
                .await?;
        }

        let movement = record_movement(
            &mut *tx,
            actor,
            input.catalog_item_id,
            MovementType::Adjust,
            input.qty,
            None,
            MovementRef::Manual(input.reason.clone()),
        )
        .await?;

        tx.commit().await?;

        info!(
            movement_id = %movement.movement_id,
            qty = input.qty,
            "Inventory adjusted"
        );
        Ok(movement)
    }
}
