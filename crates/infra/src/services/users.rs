//! User administration. Token issuance lives in front of the core.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, instrument};

use depot_auth::{Action, NewUser, Principal, Role, User, validate_role_assignment};
use depot_core::{DomainError, DomainResult, UserId};

use crate::audit::NewAuditEntry;

use super::Depot;

/// Usernames are unique, compared case-insensitively.
pub(crate) fn ensure_unique_username(user: &User, all: &HashMap<UserId, User>) -> DomainResult<()> {
    let taken = all
        .values()
        .any(|other| other.id != user.id && other.username.eq_ignore_ascii_case(&user.username));
    if taken {
        return Err(DomainError::conflict(format!("username {} is taken", user.username)));
    }
    Ok(())
}

impl Depot {
    #[instrument(skip(self, principal, input), fields(user = %principal.username, new_user = %input.username), err)]
    pub fn create_user(&self, principal: &Principal, input: NewUser) -> DomainResult<User> {
        self.guard(principal, Action::ManageUsers)?;
        let user = input.into_user(Utc::now())?;
        let user = self.users.insert_with(user, |u, all| {
            ensure_unique_username(u, all)?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_user",
                u,
                format!("Created user {} with role {}", u.username, u.role.as_str()),
            ))
        })?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub fn user(&self, principal: &Principal, user_id: UserId) -> DomainResult<User> {
        self.guard(principal, Action::ManageUsers)?;
        self.users.require(user_id)
    }

    /// Users sorted by username.
    pub fn users(&self, principal: &Principal) -> DomainResult<Vec<User>> {
        self.guard(principal, Action::ManageUsers)?;
        let mut all = self.users.list()?;
        all.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(all)
    }

    #[instrument(skip(self, principal), fields(user = %principal.username, new_role = role.as_str()), err)]
    pub fn assign_role(&self, principal: &Principal, user_id: UserId, role: Role) -> DomainResult<User> {
        self.guard(principal, Action::AssignRole)?;
        self.users.update(user_id, |u, _| {
            validate_role_assignment(principal.user_id, u)?;
            let before = u.role;
            u.role = role;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "assign_role",
                u,
                format!("Role {} -> {}", before.as_str(), role.as_str()),
            ))
        })
    }
}
