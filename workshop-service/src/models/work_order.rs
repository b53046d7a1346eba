//! Work order models: the order head with its derived monetary snapshot,
//! line items, notes, and append-only audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::payment::Payment;

/// Work order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Done,
    Canceled,
}

impl WorkOrderStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "OPEN",
            WorkOrderStatus::InProgress => "IN_PROGRESS",
            WorkOrderStatus::Done => "DONE",
            WorkOrderStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => WorkOrderStatus::InProgress,
            "DONE" => WorkOrderStatus::Done,
            "CANCELED" => WorkOrderStatus::Canceled,
            _ => WorkOrderStatus::Open,
        }
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state, derived from paid total and balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Paid => "PAID",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "PARTIAL" => PaymentStatus::Partial,
            "PAID" => PaymentStatus::Paid,
            _ => PaymentStatus::Unpaid,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line item type. Only PART lines may reference a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Labor,
    Part,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Labor => "LABOR",
            ItemType::Part => "PART",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "PART" => ItemType::Part,
            _ => ItemType::Labor,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work order row. The six monetary columns are derived: only the
/// reconciliation recompute writes them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkOrder {
    pub work_order_id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub odometer_km: Option<i32>,
    pub status: String,
    pub total_cents: i64,
    pub cost_total_cents: i64,
    pub margin_cents: i64,
    pub paid_total_cents: i64,
    pub balance_cents: i64,
    pub payment_status: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl WorkOrder {
    /// Get parsed lifecycle status.
    pub fn parsed_status(&self) -> WorkOrderStatus {
        WorkOrderStatus::from_string(&self.status)
    }

    /// Get parsed settlement status.
    pub fn parsed_payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }
}

/// Single line on a work order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkOrderItem {
    pub item_id: Uuid,
    pub tenant_id: Uuid,
    pub work_order_id: Uuid,
    pub catalog_item_id: Option<Uuid>,
    pub item_type: String,
    pub name: String,
    pub qty: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub created_utc: DateTime<Utc>,
}

impl WorkOrderItem {
    pub fn parsed_type(&self) -> ItemType {
        ItemType::from_string(&self.item_type)
    }
}

/// Projection used by the recompute: one line plus its resolved catalog
/// cost. The cost is None for LABOR lines, unlinked lines, or lines whose
/// catalog row no longer resolves.
#[derive(Debug, Clone, FromRow)]
pub struct ItemCostRow {
    pub item_type: String,
    pub qty: i32,
    pub line_total_cents: i64,
    pub catalog_cost_cents: Option<i64>,
}

/// Derived monetary snapshot persisted on the work order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkOrderTotals {
    pub total_cents: i64,
    pub cost_total_cents: i64,
    pub margin_cents: i64,
    pub paid_total_cents: i64,
    pub balance_cents: i64,
    pub payment_status: PaymentStatus,
}

/// Payments-only slice of the snapshot, recomputed when a payment is added
/// or removed without touching items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTotals {
    pub paid_total_cents: i64,
    pub balance_cents: i64,
    pub payment_status: PaymentStatus,
}

/// Free-text annotation on a work order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkOrderNote {
    pub note_id: Uuid,
    pub tenant_id: Uuid,
    pub work_order_id: Uuid,
    pub body: String,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Append-only audit row. Rows are written by engine operations and never
/// updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkOrderEvent {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub work_order_id: Uuid,
    pub event_type: String,
    pub payload: Option<serde_json::Value>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl WorkOrderEvent {
    pub const PAYMENT_ADDED: &'static str = "PAYMENT_ADDED";
}

/// Work order with its collections, for detail reads.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderDetail {
    pub work_order: WorkOrder,
    pub items: Vec<WorkOrderItem>,
    pub payments: Vec<Payment>,
    pub notes: Vec<WorkOrderNote>,
}

/// Input for creating a work order.
#[derive(Debug, Clone, Validate)]
pub struct CreateWorkOrder {
    pub customer_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub odometer_km: Option<i32>,
    pub status: Option<WorkOrderStatus>,
}

/// Patch for work order head fields. `None` keeps the current value; the
/// derived monetary columns are not reachable from here.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateWorkOrder {
    pub vehicle_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub odometer_km: Option<i32>,
    pub status: Option<WorkOrderStatus>,
}

/// Input for adding a line to a work order.
#[derive(Debug, Clone, Validate)]
pub struct CreateWorkOrderItem {
    pub item_type: ItemType,
    pub catalog_item_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1))]
    pub qty: i32,
    #[validate(range(min = 0))]
    pub unit_price_cents: i64,
}

/// Patch for a work order line. `catalog_item_id` is three-valued: `None`
/// keeps the current link, `Some(None)` clears it, `Some(Some(id))` relinks.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateWorkOrderItem {
    pub item_type: Option<ItemType>,
    pub catalog_item_id: Option<Option<Uuid>>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub qty: Option<i32>,
    #[validate(range(min = 0))]
    pub unit_price_cents: Option<i64>,
}

/// Input for adding a note.
#[derive(Debug, Clone, Validate)]
pub struct CreateWorkOrderNote {
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}

/// Filter parameters for listing work orders.
#[derive(Debug, Clone, Default)]
pub struct ListWorkOrdersFilter {
    pub status: Option<WorkOrderStatus>,
    pub customer_id: Option<Uuid>,
}
