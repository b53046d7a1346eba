//! Authenticated actor identity handed to every engine operation.
//!
//! Authentication itself happens upstream; the engine only ever sees the
//! resolved `{id, role, tenant_id}` triple and scopes every read and write
//! by it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed role set for tenant users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Staff,
}

impl Role {
    /// Get string representation for database and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
        }
    }

    /// Parse a stored role string. Unknown strings are rejected rather than
    /// defaulted: a guessed role would widen or narrow permissions silently.
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(Role::Owner),
            "ADMIN" => Some(Role::Admin),
            "STAFF" => Some(Role::Staff),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The current authenticated user acting on a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub tenant_id: Uuid,
}

impl Actor {
    pub fn new(id: Uuid, role: Role, tenant_id: Uuid) -> Self {
        Self {
            id,
            role,
            tenant_id,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
