//! User accounts managed by administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, Entity, UserId};

use crate::{Principal, Role};

/// A user account.
///
/// # Invariants
/// - `username` is non-empty (uniqueness is enforced by the directory that stores users).
/// - A user cannot reassign their own role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            username: self.username.clone(),
            role: Some(self.role),
            is_superuser: self.is_superuser,
        }
    }
}

impl Entity for User {
    type Id = UserId;
    const MODEL_NAME: &'static str = "User";

    fn id(&self) -> UserId {
        self.id
    }
}

/// Input for creating a user. New users default to `clerk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> Result<User, DomainError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if username.len() > 150 {
            return Err(DomainError::validation("username exceeds 150 characters"));
        }
        let email = self.email.trim().to_string();
        if !email.is_empty() && !email.contains('@') {
            return Err(DomainError::validation("email is malformed"));
        }

        Ok(User {
            id: UserId::new(),
            username,
            email,
            role: self.role.unwrap_or(Role::Clerk),
            is_superuser: false,
            created_at: now,
        })
    }
}

/// Privilege-escalation check for role assignment (authorization happens before this).
pub fn validate_role_assignment(actor: UserId, target: &User) -> Result<(), DomainError> {
    if actor == target.id {
        return Err(DomainError::conflict("users cannot reassign their own role"));
    }
    Ok(())
}
