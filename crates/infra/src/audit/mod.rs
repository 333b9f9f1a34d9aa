//! Audit trail boundary.
//!
//! Every mutating workflow records exactly one entry, synchronously, as the
//! last fallible step before its own commit. If recording fails the workflow
//! commits nothing. Entries are append-only.

pub mod in_memory;

pub use in_memory::InMemoryAuditTrail;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::{AuditEntryId, DomainError, Entity, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    /// `None` for system actions.
    pub actor: Option<UserId>,
    pub action: String,
    pub model_name: String,
    pub object_id: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry before the trail assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub actor: Option<UserId>,
    pub action: String,
    pub model_name: String,
    pub object_id: String,
    pub details: String,
}

impl NewAuditEntry {
    pub fn for_entity<E: Entity>(actor: Option<UserId>, action: &str, record: &E, details: impl Into<String>) -> Self {
        Self {
            actor,
            action: action.to_string(),
            model_name: E::MODEL_NAME.to_string(),
            object_id: record.id().to_string(),
            details: details.into(),
        }
    }

    pub(crate) fn stamp(self, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            actor: self.actor,
            action: self.action,
            model_name: self.model_name,
            object_id: self.object_id,
            details: self.details,
            timestamp,
        }
    }
}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub model_name: Option<String>,
    pub action: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.model_name.as_deref().is_none_or(|m| m == entry.model_name)
            && self.action.as_deref().is_none_or(|a| a == entry.action)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit trail unavailable: {0}")]
    Unavailable(String),
}

impl From<AuditError> for DomainError {
    fn from(value: AuditError) -> Self {
        DomainError::Internal(value.to_string())
    }
}

pub trait AuditTrail: Send + Sync {
    fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError>;

    /// Matching entries, newest first.
    fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError>;
}

impl<T> AuditTrail for Arc<T>
where
    T: AuditTrail + ?Sized,
{
    fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        (**self).record(entry)
    }

    fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        (**self).list(filter)
    }
}
