use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, ProductId, WarehouseId};

use crate::{MAX_QUANTITY, StockMovement};

/// The unit of mutual exclusion: one balance row per (product, warehouse).
///
/// `Ord` is the global lock order: product first, then warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl BalanceKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

impl core::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

/// Current on-hand quantity for a product at a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockBalance {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.product_id, self.warehouse_id)
    }
}

/// Decide the balance that results from applying `delta` to `current`.
///
/// - Negative result: `InsufficientStock` (nothing may be committed).
/// - Result above [`MAX_QUANTITY`]: `Internal`; the row cannot hold it.
pub fn apply_delta(current: u64, delta: i64) -> Result<u64, DomainError> {
    if delta < 0 {
        let requested = delta.unsigned_abs();
        return current
            .checked_sub(requested)
            .ok_or(DomainError::insufficient(requested, current));
    }

    match current.checked_add(delta as u64) {
        Some(next) if next <= MAX_QUANTITY => Ok(next),
        _ => Err(DomainError::internal(format!(
            "balance overflow ({current} + {delta})"
        ))),
    }
}

/// Net of ledger entries (income minus outcome, transfer legs included).
///
/// Reconciliation only; the read path uses the stored balance.
pub fn ledger_net<'a>(entries: impl IntoIterator<Item = &'a StockMovement>) -> i128 {
    entries
        .into_iter()
        .map(|e| i128::from(e.signed_delta()))
        .sum()
}
