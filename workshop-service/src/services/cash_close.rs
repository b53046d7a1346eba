//! Daily cash close snapshots.
//!
//! A close is an audit checkpoint, not a derived-state holder: it records
//! what the payment ledger summed to for one UTC day at the moment it was
//! taken, and is immutable afterwards. At most one close exists per
//! `(tenant, date)`.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use service_core::actor::Actor;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CashClose, CashTotals, CreateCashClose, PaymentMethod};
use crate::services::authz;
use crate::store::{StoreTx, WorkshopStore};

/// UTC day window `[date 00:00, date+1 00:00)`.
fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    (from, from + Duration::days(1))
}

async fn totals_for_day(
    tx: &mut dyn StoreTx,
    tenant_id: Uuid,
    date: NaiveDate,
) -> Result<CashTotals, AppError> {
    let (from_utc, to_utc) = day_window(date);
    let payments = tx
        .list_payments_in_window(tenant_id, from_utc, to_utc)
        .await?;

    let mut totals = CashTotals::default();
    for payment in &payments {
        totals.total_cents += payment.amount_cents;
        totals.payment_count += 1;
        match payment.parsed_method() {
            PaymentMethod::Cash => totals.cash_cents += payment.amount_cents,
            PaymentMethod::Card => totals.card_cents += payment.amount_cents,
            PaymentMethod::Transfer => totals.transfer_cents += payment.amount_cents,
        }
    }
    Ok(totals)
}

/// Cash close preview, creation and listing. All closed to staff.
#[derive(Clone)]
pub struct CashCloseService {
    store: Arc<dyn WorkshopStore>,
}

impl CashCloseService {
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    /// Compute one day's totals without writing anything.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id, date = %date))]
    pub async fn preview(&self, actor: &Actor, date: NaiveDate) -> Result<CashTotals, AppError> {
        authz::ensure_cash_access(actor)?;

        let mut tx = self.store.begin().await?;
        let totals = totals_for_day(&mut *tx, actor.tenant_id, date).await?;
        tx.commit().await?;
        Ok(totals)
    }

    /// Persist the snapshot for one day. A second close of the same day is
    /// rejected; there is no update counterpart.
    #[instrument(skip(self, actor, input), fields(tenant_id = %actor.tenant_id, date = %input.close_date))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreateCashClose,
    ) -> Result<CashClose, AppError> {
        authz::ensure_cash_access(actor)?;
        input.validate()?;

        let mut tx = self.store.begin().await?;

        if tx
            .find_cash_close(actor.tenant_id, input.close_date)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cash close already exists for {}",
                input.close_date
            )));
        }

        let totals = totals_for_day(&mut *tx, actor.tenant_id, input.close_date).await?;
        let close = CashClose {
            cash_close_id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            close_date: input.close_date,
            total_cents: totals.total_cents,
            cash_cents: totals.cash_cents,
            card_cents: totals.card_cents,
            transfer_cents: totals.transfer_cents,
            notes: input.notes.clone(),
            closed_by_user_id: actor.id,
            created_utc: Utc::now(),
        };
        tx.insert_cash_close(&close).await?;
        tx.commit().await?;

        info!(
            cash_close_id = %close.cash_close_id,
            total_cents = close.total_cents,
            "Cash close created"
        );
        Ok(close)
    }

    /// Closes in a date range (inclusive ends), newest first.
    #[instrument(skip(self, actor), fields(tenant_id = %actor.tenant_id))]
    pub async fn list(
        &self,
        actor: &Actor,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CashClose>, AppError> {
        authz::ensure_cash_access(actor)?;

        let mut tx = self.store.begin().await?;
        let closes = tx.list_cash_closes(actor.tenant_id, from, to).await?;
        tx.commit().await?;
        Ok(closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_window_spans_one_utc_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (from, to) = day_window(date);
        assert_eq!(from.to_rfc3339(), "2026-03-14T00:00:00+00:00");
        assert_eq!(to - from, Duration::days(1));
    }
}
