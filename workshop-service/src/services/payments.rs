//! Payment ledger operations.
//!
//! Adding or removing a payment always re-derives the paid total, balance,
//! and payment status from the remaining payment rows inside the same
//! transaction. The item-derived columns are untouched here.

use std::sync::Arc;

use chrono::Utc;
use service_core::actor::Actor;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreatePayment, Payment, WorkOrder, WorkOrderEvent};
use crate::services::authz;
use crate::services::metrics::PAYMENTS_RECORDED_TOTAL;
use crate::services::reconciliation;
use crate::store::{StoreTx, WorkshopStore};

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

/// Payment recording and removal against work orders.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn WorkshopStore>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    /// Payments on a work order, newest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn list(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let mut tx = self.store.begin().await?;
        load_order(&mut *tx, actor, work_order_id).await?;
        let payments = tx.list_payments(actor.tenant_id, work_order_id).await?;
        tx.commit().await?;
        Ok(payments)
    }

    /// Record a payment. The amount must be positive and may not exceed the
    /// order's current balance, so the paid total never passes the total.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, work_order_id = %work_order_id))]
    pub async fn add_payment(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        input: &CreatePayment,
    ) -> Result<Payment, AppError> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        // Lock before reading the balance: two concurrent payments must not
        // both pass the ceiling check against the same stale row.
        tx.lock_work_order(actor.tenant_id, work_order_id).await?;
        let order = load_order(&mut *tx, actor, work_order_id).await?;

        if input.amount_cents <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }
        if input.amount_cents > order.balance_cents {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment of {} exceeds balance of {}",
                input.amount_cents,
                order.balance_cents
            )));
        }

        let now = Utc::now();
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            work_order_id,
            amount_cents: input.amount_cents,
            method: input.method.as_str().to_string(),
            reference: input.reference.clone(),
            paid_utc: now,
            created_by_user_id: actor.id,
            created_utc: now,
        };
        tx.insert_payment(&payment).await?;

        reconciliation::recalculate_payments(&mut *tx, actor.tenant_id, &order).await?;

        let event = WorkOrderEvent {
            event_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            work_order_id,
            event_type: WorkOrderEvent::PAYMENT_ADDED.to_string(),
            payload: Some(serde_json::json!({
                "payment_id": payment.payment_id,
                "amount_cents": payment.amount_cents,
                "method": payment.method,
            })),
            created_by_user_id: actor.id,
            created_utc: now,
        };
        tx.append_work_order_event(&event).await?;

        tx.commit().await?;

        PAYMENTS_RECORDED_TOTAL
            .with_label_values(&[&payment.method])
            .inc();
        info!(
            payment_id = %payment.payment_id,
            amount_cents = payment.amount_cents,
            method = %payment.method,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Delete a payment and re-derive the order's settlement state from the
    /// remaining ones. Staff may not remove payments.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, payment_id = %payment_id))]
    pub async fn remove_payment(&self, actor: &Actor, payment_id: Uuid) -> Result<(), AppError> {
        authz::ensure_can_remove_payment(actor)?;

        let mut tx = self.store.begin().await?;
        let payment = tx
            .find_payment(actor.tenant_id, payment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id))
            })?;
        tx.lock_work_order(actor.tenant_id, payment.work_order_id)
            .await?;
        let order = tx
            .find_work_order_in_tenant(actor.tenant_id, payment.work_order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Work order {} not found",
                    payment.work_order_id
                ))
            })?;

        tx.delete_payment(actor.tenant_id, payment_id).await?;
        reconciliation::recalculate_payments(&mut *tx, actor.tenant_id, &order).await?;
        tx.commit().await?;

        info!(payment_id = %payment_id, "Payment removed");
        Ok(())
    }
}
