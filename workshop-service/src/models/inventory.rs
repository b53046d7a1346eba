//! Inventory ledger models. Stock is never stored; it is the signed sum of
//! movements per catalog item within a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Movement type in the inventory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjust,
}

impl MovementType {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjust => "ADJUST",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "OUT" => MovementType::Out,
            "ADJUST" => MovementType::Adjust,
            _ => MovementType::In,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a movement compensates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    WorkOrder,
    Purchase,
    Manual,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::WorkOrder => "WORK_ORDER",
            ReferenceType::Purchase => "PURCHASE",
            ReferenceType::Manual => "MANUAL",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "WORK_ORDER" => ReferenceType::WorkOrder,
            "PURCHASE" => ReferenceType::Purchase,
            _ => ReferenceType::Manual,
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference carried by a movement: the entity (or manual reason) the
/// movement compensates for.
#[derive(Debug, Clone)]
pub enum MovementRef {
    WorkOrder(Uuid),
    Purchase(Uuid),
    Manual(String),
}

impl MovementRef {
    pub fn reference_type(&self) -> ReferenceType {
        match self {
            MovementRef::WorkOrder(_) => ReferenceType::WorkOrder,
            MovementRef::Purchase(_) => ReferenceType::Purchase,
            MovementRef::Manual(_) => ReferenceType::Manual,
        }
    }

    pub fn reference_id(&self) -> Option<String> {
        match self {
            MovementRef::WorkOrder(id) | MovementRef::Purchase(id) => Some(id.to_string()),
            MovementRef::Manual(reason) => Some(reason.clone()),
        }
    }
}

/// One signed entry in the inventory ledger. Rows are appended and never
/// updated or deleted; corrections are new movements.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub movement_id: Uuid,
    pub tenant_id: Uuid,
    pub catalog_item_id: Uuid,
    pub movement_type: String,
    pub qty: i32,
    pub unit_cost_cents: Option<i64>,
    pub reference_type: String,
    pub reference_id: Option<String>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl InventoryMovement {
    pub fn parsed_type(&self) -> MovementType {
        MovementType::from_string(&self.movement_type)
    }

    pub fn parsed_reference_type(&self) -> ReferenceType {
        ReferenceType::from_string(&self.reference_type)
    }
}

/// Derived stock for one catalog item, for the stock listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockLevel {
    pub catalog_item_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub is_active: bool,
    pub qty_on_hand: i64,
}

/// Input for a manual stock correction. Quantity is signed and must be
/// nonzero; the reason lands in the movement's reference id.
#[derive(Debug, Clone, Validate)]
pub struct InventoryAdjustment {
    pub catalog_item_id: Uuid,
    pub qty: i32,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}
