//! Purchase receiving workflow.
//!
//! A purchase moves freely between DRAFT, ORDERED, and CANCELED; RECEIVED
//! is only reachable through [`PurchaseService::receive`], which emits one
//! inbound inventory movement per line in the same transaction that flips
//! the status. Once RECEIVED, the purchase and its lines are frozen.

use std::sync::Arc;

use chrono::Utc;
use service_core::actor::Actor;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CatalogItemType, CreatePurchase, CreatePurchaseItem, MovementRef, MovementType, Purchase,
    PurchaseDetail, PurchaseItem, PurchaseStatus, UpdatePurchase,
};
use crate::services::inventory::record_movement;
use crate::services::reconciliation::checked_line_total;
use crate::store::{StoreTx, WorkshopStore};

async fn load_purchase(
    tx: &mut dyn StoreTx,
    actor: &Actor,
    purchase_id: Uuid,
) -> Result<Purchase, AppError> {
    tx.find_purchase(actor.tenant_id, purchase_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Purchase {} not found", purchase_id)))
}

fn ensure_editable(purchase: &Purchase) -> Result<(), AppError> {
    if purchase.parsed_status() == PurchaseStatus::Received {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "A RECEIVED purchase can no longer be edited"
        )));
    }
    Ok(())
}

/// Re-derive the purchase total from its current lines.
async fn recalculate_total(
    tx: &mut dyn StoreTx,
    purchase: &mut Purchase,
) -> Result<(), AppError> {
    purchase.total_cents = tx
        .sum_purchase_items(purchase.tenant_id, purchase.purchase_id)
        .await?;
    tx.update_purchase(purchase).await?;
    Ok(())
}

async fn resolve_catalog_part(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    catalog_item_id: Uuid,
) -> Result<(), AppError> {
    tx.find_catalog_item(tenant_id, catalog_item_id)
        .await?
        .filter(|item| item.parsed_type() == CatalogItemType::Part)
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Catalog part {} not found", catalog_item_id))
        })?;
    Ok(())
}

/// Purchase lifecycle operations.
#[derive(Clone)]
pub struct PurchaseService {
    store: Arc<dyn WorkshopStore>,
}

impl PurchaseService {
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    /// Create a DRAFT purchase, optionally with initial lines.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, supplier_id = %input.supplier_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreatePurchase,
    ) -> Result<PurchaseDetail, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;

        tx.find_supplier(actor.tenant_id, input.supplier_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Supplier {} not found", input.supplier_id))
            })?;

        let now = Utc::now();
        let mut purchase = Purchase {
            purchase_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            supplier_id: input.supplier_id,
            status: PurchaseStatus::Draft.as_str().to_string(),
            total_cents: 0,
            notes: input.notes.clone(),
            created_by_user_id: actor.id,
            created_utc: now,
            received_utc: None,
        };
        tx.insert_purchase(&purchase).await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            resolve_catalog_part(&mut *tx, actor.tenant_id, line.catalog_item_id).await?;
            let line_total_cents = checked_line_total(line.qty, line.unit_cost_cents)?;
            let item = PurchaseItem {
                item_id: Uuid::new_v4(),
                tenant_id: actor.tenant_id,
                purchase_id: purchase.purchase_id,
                catalog_item_id: line.catalog_item_id,
                qty: line.qty,
                unit_cost_cents: line.unit_cost_cents,
                line_total_cents,
                created_utc: Utc::now(),
            };
            tx.insert_purchase_item(&item).await?;
            items.push(item);
        }

        recalculate_total(&mut *tx, &mut purchase).await?;
        tx.commit().await?;

        info!(
            purchase_id = %purchase.purchase_id,
            item_count = items.len(),
            "Purchase created"
        );
        Ok(PurchaseDetail { purchase, items })
    }

    /// Purchase with its lines.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, purchase_id = %purchase_id))]
    pub async fn get(&self, actor: &Actor, purchase_id: Uuid) -> Result<PurchaseDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let purchase = load_purchase(&mut *tx, actor, purchase_id).await?;
        let items = tx.list_purchase_items(actor.tenant_id, purchase_id).await?;
        tx.commit().await?;
        Ok(PurchaseDetail { purchase, items })
    }

    /// Purchases of the tenant, newest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id))]
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Purchase>, AppError> {
        let mut tx = self.store.begin().await?;
        let purchases = tx.list_purchases(actor.tenant_id).await?;
        tx.commit().await?;
        Ok(purchases)
    }

    /// Patch the purchase head. Status may move between DRAFT, ORDERED, and
    /// CANCELED; RECEIVED is only reachable through receive, so the movement
    /// emission cannot be skipped.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, purchase_id = %purchase_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        purchase_id: Uuid,
        input: &UpdatePurchase,
    ) -> Result<Purchase, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let mut purchase = load_purchase(&mut *tx, actor, purchase_id).await?;
        ensure_editable(&purchase)?;

        if let Some(status) = input.status {
            if status == PurchaseStatus::Received {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Use receive to mark a purchase RECEIVED"
                )));
            }
            purchase.status = status.as_str().to_string();
        }
        if let Some(notes) = &input.notes {
            purchase.notes = Some(notes.clone());
        }

        tx.update_purchase(&purchase).await?;
        tx.commit().await?;

        info!(purchase_id = %purchase_id, status = %purchase.status, "Purchase updated");
        Ok(purchase)
    }

    /// Add a line and re-derive the purchase total.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, purchase_id = %purchase_id))]
    pub async fn add_item(
        &self,
        actor: &Actor,
        purchase_id: Uuid,
        input: &CreatePurchaseItem,
    ) -> Result<PurchaseItem, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let mut purchase = load_purchase(&mut *tx, actor, purchase_id).await?;
        ensure_editable(&purchase)?;

        resolve_catalog_part(&mut *tx, actor.tenant_id, input.catalog_item_id).await?;
        let line_total_cents = checked_line_total(input.qty, input.unit_cost_cents)?;

        let item = PurchaseItem {
            item_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            purchase_id,
            catalog_item_id: input.catalog_item_id,
            qty: input.qty,
            unit_cost_cents: input.unit_cost_cents,
            line_total_cents,
            created_utc: Utc::now(),
        };
        tx.insert_purchase_item(&item).await?;
        recalculate_total(&mut *tx, &mut purchase).await?;
        tx.commit().await?;

        info!(item_id = %item.item_id, "Purchase item added");
        Ok(item)
    }

    /// Remove a line and re-derive the purchase total.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, purchase_id = %purchase_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        actor: &Actor,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let mut purchase = load_purchase(&mut *tx, actor, purchase_id).await?;
        ensure_editable(&purchase)?;

        tx.find_purchase_item(actor.tenant_id, purchase_id, item_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Purchase item {} not found", item_id))
            })?;

        tx.delete_purchase_item(actor.tenant_id, purchase_id, item_id)
            .await?;
        recalculate_total(&mut *tx, &mut purchase).await?;
        tx.commit().await?;

        info!(item_id = %item_id, "Purchase item removed");
        Ok(())
    }

    /// Receive the purchase: flip the status and append one IN movement per
    /// line, all in one transaction. Receiving twice is rejected, as is
    /// receiving an empty purchase.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, purchase_id = %purchase_id))]
    pub async fn receive(&self, actor: &Actor, purchase_id: Uuid) -> Result<Purchase, AppError> {
        let mut tx = self.store.begin().await?;
        let mut purchase = load_purchase(&mut *tx, actor, purchase_id).await?;

        if purchase.parsed_status() == PurchaseStatus::Received {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Purchase {} is already RECEIVED",
                purchase_id
            )));
        }
        let items = tx.list_purchase_items(actor.tenant_id, purchase_id).await?;
        if items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot receive a purchase with no items"
            )));
        }

        purchase.status = PurchaseStatus::Received.as_str().to_string();
        purchase.received_utc = Some(Utc::now());
        tx.update_purchase(&purchase).await?;

        for item in &items {
            record_movement(
                &mut *tx,
                actor,
                item.catalog_item_id,
                MovementType::In,
                item.qty,
                Some(item.unit_cost_cents),
                MovementRef::Purchase(purchase_id),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            purchase_id = %purchase_id,
            item_count = items.len(),
            "Purchase received"
        );
        Ok(purchase)
    }
}
