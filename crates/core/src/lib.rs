//! `depot-core`: shared building blocks for the warehouse domain.
//!
//! Identifiers, the domain error taxonomy and the small traits every record
//! type implements. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, Timestamped};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{
    AuditEntryId, CategoryId, CountId, MovementId, NotificationId, OrderId, ProductId, TransferId,
    UserId, WarehouseId,
};
pub use value_object::ValueObject;
