//! Catalog item model. Rows are soft-deleted (`is_active = false`) so that
//! historical work order lines keep resolving their cost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog item kind. Only PART items track stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogItemType {
    Part,
    Service,
}

impl CatalogItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogItemType::Part => "PART",
            CatalogItemType::Service => "SERVICE",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "SERVICE" => CatalogItemType::Service,
            _ => CatalogItemType::Part,
        }
    }
}

impl std::fmt::Display for CatalogItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub catalog_item_id: Uuid,
    pub tenant_id: Uuid,
    pub item_type: String,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl CatalogItem {
    pub fn parsed_type(&self) -> CatalogItemType {
        CatalogItemType::from_string(&self.item_type)
    }
}
