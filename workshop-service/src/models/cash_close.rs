//! Daily cash close snapshot: an immutable audit checkpoint of one day's
//! payment totals by method.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Persisted snapshot. At most one row per `(tenant_id, close_date)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CashClose {
    pub cash_close_id: Uuid,
    pub tenant_id: Uuid,
    pub close_date: NaiveDate,
    pub total_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    pub notes: Option<String>,
    pub closed_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Aggregated totals for one UTC day, computed before (or without) closing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CashTotals {
    pub total_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    pub payment_count: i64,
}

/// Input for closing a day.
#[derive(Debug, Clone, Validate)]
pub struct CreateCashClose {
    pub close_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}
