//! The Balance Store.
//!
//! One `Mutex` per (product, warehouse) row; the map of rows sits behind its
//! own `RwLock`. Lock discipline:
//!
//! - row locks are only ever taken in ascending [`BalanceKey`] order;
//! - the map lock is never held while waiting on a row lock.
//!
//! A mutation goes: [`BalanceStore::rows_for`] (get-or-create the row
//! handles) → [`BalanceRows::lock`] → read/check/stage → [`BalanceTxn::commit`].
//! Dropping a `BalanceTxn` without committing discards everything staged.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use depot_core::{DomainError, ProductId};
use depot_inventory::{BalanceKey, StockBalance};

#[derive(Debug, Default)]
struct BalanceRow {
    quantity: u64,
    /// `None` until the first committed write; such rows are lock slots only.
    updated_at: Option<DateTime<Utc>>,
    /// Set when the row was deleted while someone still held its handle.
    retired: bool,
}

type RowHandle = Arc<Mutex<BalanceRow>>;

#[derive(Debug, Default)]
pub struct BalanceStore {
    rows: RwLock<BTreeMap<BalanceKey, RowHandle>>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity; 0 when the pair has never been written.
    pub fn get_balance(&self, key: BalanceKey) -> Result<u64, DomainError> {
        let handle = {
            let rows = self.rows.read().map_err(|_| DomainError::poisoned("balance map"))?;
            rows.get(&key).cloned()
        };
        match handle {
            Some(row) => {
                let quantity = lock_row(&row)?.quantity;
                Ok(quantity)
            }
            None => Ok(0),
        }
    }

    /// Row handles for `keys`, created at 0 where missing, sorted and deduplicated.
    pub fn rows_for(&self, keys: &[BalanceKey]) -> Result<BalanceRows, DomainError> {
        let mut wanted: Vec<BalanceKey> = keys.to_vec();
        wanted.sort();
        wanted.dedup();

        let mut rows = self.rows.write().map_err(|_| DomainError::poisoned("balance map"))?;
        let handles = wanted
            .into_iter()
            .map(|key| (key, rows.entry(key).or_default().clone()))
            .collect();
        Ok(BalanceRows { handles })
    }

    /// Committed balances, optionally for a single product.
    pub fn snapshot(&self, product: Option<ProductId>) -> Result<Vec<StockBalance>, DomainError> {
        let handles = self.handles_where(|key| product.is_none_or(|p| key.product_id == p))?;
        let mut out = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let row = lock_row(&handle)?;
            if let Some(updated_at) = row.updated_at {
                out.push(StockBalance {
                    product_id: key.product_id,
                    warehouse_id: key.warehouse_id,
                    quantity: row.quantity,
                    updated_at,
                });
            }
        }
        Ok(out)
    }

    /// Delete every row whose key matches `pred`, once `then` succeeds.
    ///
    /// The caller must keep new matching rows from appearing during the call
    /// (the `Depot` holds its catalog gate exclusively). The matching rows
    /// stay locked while `then` runs, so no movement can slip in between the
    /// emptiness check and the removal. With
    /// `require_empty`, a non-zero row fails the call with `Conflict` before
    /// `then` runs. `then` receives the non-empty rows being dropped; when it
    /// fails, nothing is removed.
    pub fn retire_with<F, P, T>(&self, pred: P, require_empty: bool, then: F) -> Result<T, DomainError>
    where
        P: Fn(&BalanceKey) -> bool,
        F: FnOnce(&[StockBalance]) -> Result<T, DomainError>,
    {
        let handles = self.handles_where(pred)?;
        let keys: Vec<BalanceKey> = handles.iter().map(|(k, _)| *k).collect();
        let rows = BalanceRows { handles };
        let mut txn = rows.lock()?;

        if require_empty {
            if let Some((key, row)) = txn.locked.iter().find(|(_, row)| row.quantity > 0) {
                return Err(DomainError::conflict(format!(
                    "{} units remain at warehouse {}",
                    row.quantity, key.warehouse_id
                )));
            }
        }

        let dropped: Vec<StockBalance> = txn
            .locked
            .iter()
            .filter(|(_, row)| row.quantity > 0)
            .map(|(key, row)| StockBalance {
                product_id: key.product_id,
                warehouse_id: key.warehouse_id,
                quantity: row.quantity,
                updated_at: row.updated_at.unwrap_or_else(Utc::now),
            })
            .collect();
        let out = then(&dropped)?;

        for (_, row) in txn.locked.iter_mut() {
            row.retired = true;
        }
        // Rows are still locked here. Taking the map lock now is safe: no
        // path waits on a row while holding the map.
        let mut map = self.rows.write().map_err(|_| DomainError::poisoned("balance map"))?;
        for key in keys {
            map.remove(&key);
        }
        Ok(out)
    }

    /// Rows in the map, lock slots included.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    fn handles_where<F>(&self, pred: F) -> Result<Vec<(BalanceKey, RowHandle)>, DomainError>
    where
        F: Fn(&BalanceKey) -> bool,
    {
        let rows = self.rows.read().map_err(|_| DomainError::poisoned("balance map"))?;
        Ok(rows
            .iter()
            .filter(|(key, _)| pred(key))
            .map(|(key, handle)| (*key, handle.clone()))
            .collect())
    }
}

/// Row handles for one operation, in lock order.
#[derive(Debug)]
pub struct BalanceRows {
    handles: Vec<(BalanceKey, RowHandle)>,
}

impl BalanceRows {
    /// Lock every row, in ascending key order.
    pub fn lock(&self) -> Result<BalanceTxn<'_>, DomainError> {
        let mut locked = Vec::with_capacity(self.handles.len());
        for (key, handle) in &self.handles {
            let row = lock_row(handle)?;
            if row.retired {
                return Err(DomainError::NotFound("Product"));
            }
            locked.push((*key, row));
        }
        Ok(BalanceTxn {
            locked,
            staged: BTreeMap::new(),
        })
    }
}

/// Exclusive access to a set of balance rows.
#[derive(Debug)]
pub struct BalanceTxn<'a> {
    locked: Vec<(BalanceKey, MutexGuard<'a, BalanceRow>)>,
    staged: BTreeMap<BalanceKey, u64>,
}

impl BalanceTxn<'_> {
    /// Quantity as committed (staged values are not visible).
    pub fn quantity(&self, key: BalanceKey) -> Result<u64, DomainError> {
        self.row(key).map(|row| row.quantity)
    }

    /// Record the value `key` will hold on commit.
    pub fn stage(&mut self, key: BalanceKey, quantity: u64) -> Result<(), DomainError> {
        self.row(key)?;
        self.staged.insert(key, quantity);
        Ok(())
    }

    /// Write every staged value and release the locks.
    pub fn commit(mut self, now: DateTime<Utc>) -> Vec<StockBalance> {
        let mut written = Vec::with_capacity(self.staged.len());
        for (key, row) in self.locked.iter_mut() {
            if let Some(quantity) = self.staged.get(key) {
                row.quantity = *quantity;
                row.updated_at = Some(now);
                written.push(StockBalance {
                    product_id: key.product_id,
                    warehouse_id: key.warehouse_id,
                    quantity: *quantity,
                    updated_at: now,
                });
            }
        }
        written
    }

    fn row(&self, key: BalanceKey) -> Result<&BalanceRow, DomainError> {
        self.locked
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, row)| &**row)
            .ok_or_else(|| DomainError::internal(format!("balance row {key} is not locked")))
    }
}

fn lock_row(row: &RowHandle) -> Result<MutexGuard<'_, BalanceRow>, DomainError> {
    row.lock().map_err(|_| DomainError::poisoned("balance row"))
}
