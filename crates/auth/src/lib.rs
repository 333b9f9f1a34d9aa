//! `depot-auth`: role-based access guard.
//!
//! A single static policy table decides whether a principal may perform an
//! action. Services call [`authorize`] before any handler logic runs; nothing
//! else in the workspace inspects roles.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, allowed_roles, authorize, is_allowed};
pub use permissions::{Action, ActionClass};
pub use principal::Principal;
pub use roles::Role;
pub use user::{NewUser, User, validate_role_assignment};
