//! Customer and vehicle models. Both are owner-scoped: the engine only
//! performs existence checks against them when a work order is created or
//! repointed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub plate: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub created_utc: DateTime<Utc>,
}
