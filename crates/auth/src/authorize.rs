use thiserror::Error;

use depot_core::DomainError;

use crate::{Action, ActionClass, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: role '{role}' may not perform '{action}'")]
    Forbidden { role: String, action: Action },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::PermissionDenied(value.to_string())
    }
}

/// Roles allowed per action class (admins are allowed everything on top).
///
/// Reads take the widest role set; the admin-only set is the narrowest.
pub fn allowed_roles(class: ActionClass) -> &'static [Role] {
    use Role::*;
    match class {
        ActionClass::Read => &[Admin, WarehouseManager, Clerk, Logistician, Analyst],
        ActionClass::Write => &[Admin, WarehouseManager, Clerk],
        ActionClass::Manage => &[Admin, WarehouseManager],
        ActionClass::Logistics => &[Admin, WarehouseManager, Logistician],
        ActionClass::Reconcile => &[Admin, WarehouseManager],
        ActionClass::Analytics => &[Admin, Analyst],
        ActionClass::AdminOnly => &[Admin],
        ActionClass::SelfService => &[Admin, WarehouseManager, Clerk, Logistician, Analyst],
    }
}

/// Pure policy check, no IO.
pub fn is_allowed(principal: Option<&Principal>, action: Action) -> bool {
    authorize(principal, action).is_ok()
}

/// Authorize `action` for `principal`.
///
/// - No principal: always denied.
/// - Superuser or admin: always allowed.
/// - Self-service actions (own inbox): any authenticated principal.
/// - Otherwise the role must appear in the action class's row of the table.
pub fn authorize(principal: Option<&Principal>, action: Action) -> Result<(), AuthzError> {
    let Some(principal) = principal else {
        return Err(AuthzError::Unauthenticated);
    };

    if principal.is_superuser || action.class() == ActionClass::SelfService {
        return Ok(());
    }

    match principal.role {
        Some(Role::Admin) => Ok(()),
        Some(role) if allowed_roles(action.class()).contains(&role) => Ok(()),
        Some(role) => Err(AuthzError::Forbidden {
            role: role.to_string(),
            action,
        }),
        None => Err(AuthzError::Forbidden {
            role: "none".to_string(),
            action,
        }),
    }
}
