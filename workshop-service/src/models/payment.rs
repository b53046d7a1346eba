//! Payment ledger model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Accepted payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "CARD" => PaymentMethod::Card,
            "TRANSFER" => PaymentMethod::Transfer,
            _ => PaymentMethod::Cash,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Money received against a work order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub work_order_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub reference: Option<String>,
    pub paid_utc: DateTime<Utc>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Payment {
    pub fn parsed_method(&self) -> PaymentMethod {
        PaymentMethod::from_string(&self.method)
    }
}

/// Input for recording a payment. The amount ceiling (no overpayment) is
/// checked against the order balance inside the transaction, not here.
#[derive(Debug, Clone, Validate)]
pub struct CreatePayment {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
}
