use std::sync::RwLock;

use chrono::Utc;

use super::{AuditEntry, AuditError, AuditFilter, AuditTrail, NewAuditEntry};

/// In-memory append-only audit trail.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrail {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::Unavailable("lock poisoned".to_string()))?;
        let stored = entry.stamp(Utc::now());
        entries.push(stored.clone());
        Ok(stored)
    }

    fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::Unavailable("lock poisoned".to_string()))?;
        Ok(entries.iter().rev().filter(|e| filter.matches(e)).cloned().collect())
    }
}
