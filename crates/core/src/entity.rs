//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Name used for this record type in audit entries and logs (e.g. `"Product"`).
    const MODEL_NAME: &'static str;
}

/// Records that carry a creation timestamp.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}
