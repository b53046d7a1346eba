//! Role guards consumed by the engine operations.
//!
//! One function per permission, so the rules live in one place instead of
//! inline role comparisons scattered through the services.

use service_core::actor::Actor;
use service_core::error::AppError;

use crate::models::WorkOrderStatus;

/// Payments can only be removed by non-staff roles.
pub fn ensure_can_remove_payment(actor: &Actor) -> Result<(), AppError> {
    if actor.is_staff() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Staff cannot remove payments"
        )));
    }
    Ok(())
}

/// Cash close preview, creation and listing are closed to staff.
pub fn ensure_cash_access(actor: &Actor) -> Result<(), AppError> {
    if actor.is_staff() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Staff cannot access cash closes"
        )));
    }
    Ok(())
}

/// Lines of a DONE work order are frozen for everyone but admins.
pub fn ensure_items_editable(actor: &Actor, status: WorkOrderStatus) -> Result<(), AppError> {
    if status == WorkOrderStatus::Done && !actor.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Only admins can modify items of a DONE work order"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::actor::Role;
    use uuid::Uuid;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role, Uuid::new_v4())
    }

    #[test]
    fn staff_cannot_remove_payments() {
        assert!(ensure_can_remove_payment(&actor(Role::Staff)).is_err());
        assert!(ensure_can_remove_payment(&actor(Role::Owner)).is_ok());
        assert!(ensure_can_remove_payment(&actor(Role::Admin)).is_ok());
    }

    #[test]
    fn staff_cannot_access_cash() {
        assert!(ensure_cash_access(&actor(Role::Staff)).is_err());
        assert!(ensure_cash_access(&actor(Role::Owner)).is_ok());
    }

    #[test]
    fn done_order_items_are_admin_only() {
        assert!(ensure_items_editable(&actor(Role::Admin), WorkOrderStatus::Done).is_ok());
        assert!(ensure_items_editable(&actor(Role::Owner), WorkOrderStatus::Done).is_err());
        assert!(ensure_items_editable(&actor(Role::Staff), WorkOrderStatus::Done).is_err());
    }

    #[test]
    fn open_order_items_are_editable_by_all_roles() {
        for role in [Role::Owner, Role::Admin, Role::Staff] {
            assert!(ensure_items_editable(&actor(role), WorkOrderStatus::Open).is_ok());
            assert!(ensure_items_editable(&actor(role), WorkOrderStatus::InProgress).is_ok());
        }
    }
}
