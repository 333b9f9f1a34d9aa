use serde::{Deserialize, Serialize};

use depot_core::UserId;

use crate::Role;

/// An authenticated requester, as resolved by whatever sits in front of the core.
///
/// How the principal was authenticated (tokens, sessions) is not this crate's
/// concern. A user without a role can still authenticate but is denied every
/// role-gated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub role: Option<Role>,
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(user_id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            username: username.into(),
            role: Some(role),
            is_superuser: false,
        }
    }

    pub fn superuser(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            role: Some(Role::Admin),
            is_superuser: true,
        }
    }

    pub fn without_role(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            role: None,
            is_superuser: false,
        }
    }
}
