//! Purchase receiving models: supplier, purchase head, and purchase lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Purchase lifecycle. RECEIVED is terminal for item mutation and is only
/// reachable through the receive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Draft,
    Ordered,
    Received,
    Canceled,
}

impl PurchaseStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "DRAFT",
            PurchaseStatus::Ordered => "ORDERED",
            PurchaseStatus::Received => "RECEIVED",
            PurchaseStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "ORDERED" => PurchaseStatus::Ordered,
            "RECEIVED" => PurchaseStatus::Received,
            "CANCELED" => PurchaseStatus::Canceled,
            _ => PurchaseStatus::Draft,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Purchase {
    pub purchase_id: Uuid,
    pub tenant_id: Uuid,
    pub supplier_id: Uuid,
    pub status: String,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub received_utc: Option<DateTime<Utc>>,
}

impl Purchase {
    pub fn parsed_status(&self) -> PurchaseStatus {
        PurchaseStatus::from_string(&self.status)
    }
}

/// Single line on a purchase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub item_id: Uuid,
    pub tenant_id: Uuid,
    pub purchase_id: Uuid,
    pub catalog_item_id: Uuid,
    pub qty: i32,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
    pub created_utc: DateTime<Utc>,
}

/// Purchase with its lines, for detail reads.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

/// Input for creating a purchase, optionally with initial lines.
#[derive(Debug, Clone, Validate)]
pub struct CreatePurchase {
    pub supplier_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(nested)]
    pub items: Vec<CreatePurchaseItem>,
}

/// Input for one purchase line.
#[derive(Debug, Clone, Validate)]
pub struct CreatePurchaseItem {
    pub catalog_item_id: Uuid,
    #[validate(range(min = 1))]
    pub qty: i32,
    #[validate(range(min = 0))]
    pub unit_cost_cents: i64,
}

/// Patch for a purchase head. Status may move freely between DRAFT,
/// ORDERED, and CANCELED; RECEIVED is not writable here.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdatePurchase {
    pub status: Option<PurchaseStatus>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}
