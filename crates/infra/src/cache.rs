//! Cache invalidation signals.
//!
//! The core never reads through a cache; it only tells whoever caches list
//! and balance views that they are stale. Best-effort.

use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    StockMovements,
    StockBalance,
    WarehouseList,
    CategoryList,
}

impl CacheScope {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheScope::StockMovements => "stock_movements",
            CacheScope::StockBalance => "stock_balance",
            CacheScope::WarehouseList => "warehouse_list",
            CacheScope::CategoryList => "category_list",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cache invalidation failed for {scope}: {reason}")]
pub struct CacheError {
    pub scope: &'static str,
    pub reason: String,
}

pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scope: CacheScope) -> Result<(), CacheError>;
}

impl<T> CacheInvalidator for Arc<T>
where
    T: CacheInvalidator + ?Sized,
{
    fn invalidate(&self, scope: CacheScope) -> Result<(), CacheError> {
        (**self).invalidate(scope)
    }
}

/// For deployments without a cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn invalidate(&self, _scope: CacheScope) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Remembers every signal; handy in tests and for local inspection.
#[derive(Debug, Default)]
pub struct RecordingCache {
    seen: Mutex<Vec<CacheScope>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<CacheScope> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(_) => vec![],
        }
    }
}

impl CacheInvalidator for RecordingCache {
    fn invalidate(&self, scope: CacheScope) -> Result<(), CacheError> {
        let mut seen = self.seen.lock().map_err(|_| CacheError {
            scope: scope.as_str(),
            reason: "lock poisoned".to_string(),
        })?;
        seen.push(scope);
        Ok(())
    }
}
