//! Full-recompute reconciliation of work order monetary state.
//!
//! The six derived columns on a work order row are never edited in place.
//! Every item or payment mutation calls [`recalculate`] (or
//! [`recalculate_payments`] when only payments changed) inside its own
//! transaction, and the snapshot is rebuilt from the line items and payment
//! rows it finds there.

use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{ItemType, PaymentStatus, PaymentTotals, WorkOrder, WorkOrderTotals};
use crate::services::metrics::RECONCILIATIONS_TOTAL;
use crate::store::StoreTx;

/// Multiply a quantity by a unit amount in cents, rejecting overflow.
pub fn checked_line_total(qty: i32, unit_cents: i64) -> Result<i64, AppError> {
    i64::from(qty)
        .checked_mul(unit_cents)
        .filter(|total| *total >= 0)
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Line total out of range: {} x {}",
                qty,
                unit_cents
            ))
        })
}

/// Outstanding balance. Clamped at zero: overpayment is rejected upstream,
/// but a later item removal can still push paid above total.
pub fn balance_for(total_cents: i64, paid_total_cents: i64) -> i64 {
    (total_cents - paid_total_cents).max(0)
}

/// Settlement state. UNPAID wins when nothing was paid, so a zero-total
/// order stays UNPAID until money actually arrives.
pub fn payment_status_for(paid_total_cents: i64, balance_cents: i64) -> PaymentStatus {
    if paid_total_cents <= 0 {
        PaymentStatus::Unpaid
    } else if balance_cents == 0 {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// Rebuild every derived column from the current item and payment rows and
/// persist the result. Cost accrues only on PART lines whose catalog row
/// still resolves; anything else contributes zero cost.
pub async fn recalculate(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    work_order_id: Uuid,
) -> Result<WorkOrderTotals, AppError> {
    let rows = tx.list_item_cost_rows(tenant_id, work_order_id).await?;

    let mut total_cents: i64 = 0;
    let mut cost_total_cents: i64 = 0;
    for row in &rows {
        total_cents = total_cents
            .checked_add(row.line_total_cents)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Work order total overflows")))?;

        if ItemType::from_string(&row.item_type) == ItemType::Part {
            if let Some(cost) = row.catalog_cost_cents {
                let line_cost = checked_line_total(row.qty, cost)?;
                cost_total_cents = cost_total_cents.checked_add(line_cost).ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("Work order cost total overflows"))
                })?;
            }
        }
    }

    let margin_cents = total_cents - cost_total_cents;
    let paid_total_cents = tx.sum_payments(tenant_id, work_order_id).await?;
    let balance_cents = balance_for(total_cents, paid_total_cents);
    let payment_status = payment_status_for(paid_total_cents, balance_cents);

    let totals = WorkOrderTotals {
        total_cents,
        cost_total_cents,
        margin_cents,
        paid_total_cents,
        balance_cents,
        payment_status,
    };
    tx.update_work_order_totals(tenant_id, work_order_id, &totals)
        .await?;

    RECONCILIATIONS_TOTAL.inc();
    Ok(totals)
}

/// Payments-only recompute. Items did not change, so the item-derived
/// columns are taken from the order row as-is.
pub async fn recalculate_payments(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    order: &WorkOrder,
) -> Result<PaymentTotals, AppError> {
    let paid_total_cents = tx.sum_payments(tenant_id, order.work_order_id).await?;
    let balance_cents = balance_for(order.total_cents, paid_total_cents);
    let payment_status = payment_status_for(paid_total_cents, balance_cents);

    let totals = PaymentTotals {
        paid_total_cents,
        balance_cents,
        payment_status,
    };
    tx.update_work_order_payment_totals(tenant_id, order.work_order_id, &totals)
        .await?;

    RECONCILIATIONS_TOTAL.inc();
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_clamps_at_zero() {
        assert_eq!(balance_for(10_000, 2_500), 7_500);
        assert_eq!(balance_for(10_000, 10_000), 0);
        assert_eq!(balance_for(5_000, 8_000), 0);
        assert_eq!(balance_for(0, 0), 0);
    }

    #[test]
    fn payment_status_precedence() {
        assert_eq!(payment_status_for(0, 0), PaymentStatus::Unpaid);
        assert_eq!(payment_status_for(-5, 100), PaymentStatus::Unpaid);
        assert_eq!(payment_status_for(2_500, 7_500), PaymentStatus::Partial);
        assert_eq!(payment_status_for(10_000, 0), PaymentStatus::Paid);
    }

    #[test]
    fn line_total_overflow_is_rejected() {
        assert!(checked_line_total(2, i64::MAX / 2 + 1).is_err());
        assert_eq!(checked_line_total(4, 2_500).unwrap(), 10_000);
        assert_eq!(checked_line_total(1, 0).unwrap(), 0);
    }
}
