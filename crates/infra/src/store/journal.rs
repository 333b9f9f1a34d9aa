//! Append-only ledger: stock movements and transfers.
//!
//! Nothing here edits or deletes an entry. The write lock is held only for
//! the push itself; ordering per (product, warehouse) comes from the balance
//! row lock the caller already holds.

use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use depot_core::{DomainError, TransferId};
use depot_inventory::{BalanceKey, StockMovement, StockTransfer, ledger_net};

#[derive(Debug, Default)]
struct Ledger {
    movements: Vec<StockMovement>,
    transfers: Vec<StockTransfer>,
}

#[derive(Debug, Default)]
pub struct Journal {
    inner: RwLock<Ledger>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_movement(&self, movement: StockMovement) {
        self.write().movements.push(movement);
    }

    /// Append a transfer together with its two ledger legs.
    pub fn append_transfer(&self, transfer: StockTransfer) {
        let mut ledger = self.write();
        ledger.movements.extend(transfer.legs());
        ledger.transfers.push(transfer);
    }

    /// Ledger entries matching `pred`, oldest first.
    pub fn movements<F>(&self, pred: F) -> Result<Vec<StockMovement>, DomainError>
    where
        F: Fn(&StockMovement) -> bool,
    {
        let ledger = self.inner.read().map_err(|_| DomainError::poisoned("journal"))?;
        Ok(ledger.movements.iter().filter(|m| pred(m)).cloned().collect())
    }

    pub fn transfers(&self) -> Result<Vec<StockTransfer>, DomainError> {
        let ledger = self.inner.read().map_err(|_| DomainError::poisoned("journal"))?;
        Ok(ledger.transfers.clone())
    }

    pub fn transfer(&self, id: TransferId) -> Result<Option<StockTransfer>, DomainError> {
        let ledger = self.inner.read().map_err(|_| DomainError::poisoned("journal"))?;
        Ok(ledger.transfers.iter().find(|t| t.id == id).cloned())
    }

    /// The transfer that already reverses `id`, if any.
    pub fn reversal_of(&self, id: TransferId) -> Result<Option<TransferId>, DomainError> {
        let ledger = self.inner.read().map_err(|_| DomainError::poisoned("journal"))?;
        Ok(ledger
            .transfers
            .iter()
            .find(|t| t.reverses == Some(id))
            .map(|t| t.id))
    }

    /// Net of every ledger entry for `key`.
    pub fn net(&self, key: BalanceKey) -> Result<i128, DomainError> {
        let ledger = self.inner.read().map_err(|_| DomainError::poisoned("journal"))?;
        Ok(ledger_net(
            ledger
                .movements
                .iter()
                .filter(|m| m.product_id == key.product_id && m.warehouse_id == key.warehouse_id),
        ))
    }

    // Appends run after the audit entry is written, so they must not fail.
    // A push never leaves the vectors half-written, so a poisoned lock still
    // guards a consistent ledger.
    fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
