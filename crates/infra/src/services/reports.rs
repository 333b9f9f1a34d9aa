//! Read-side reports: low stock, analytics, audit log.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use depot_auth::{Action, Principal};
use depot_core::{DomainResult, WarehouseId};
use depot_inventory::{BalanceKey, LowStockItem, LowStockScan, scan};

use crate::audit::{AuditEntry, AuditFilter};

use super::Depot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_products: usize,
    pub total_warehouses: usize,
    pub low_stock_count: usize,
}

impl Depot {
    /// Products at or below their minimum in their primary warehouse.
    pub fn list_low_stock(&self, principal: &Principal, warehouse_id: Option<WarehouseId>) -> DomainResult<Vec<LowStockItem>> {
        self.guard(principal, Action::ViewLowStock)?;
        Ok(self.scan_low_stock(warehouse_id)?.items)
    }

    pub fn analytics(&self, principal: &Principal) -> DomainResult<AnalyticsSummary> {
        self.guard(principal, Action::ViewAnalytics)?;
        Ok(AnalyticsSummary {
            total_products: self.products.count()?,
            total_warehouses: self.warehouses.count()?,
            low_stock_count: self.scan_low_stock(None)?.items.len(),
        })
    }

    /// Audit entries matching `filter`, newest first.
    pub fn audit_log(&self, principal: &Principal, filter: &AuditFilter) -> DomainResult<Vec<AuditEntry>> {
        self.guard(principal, Action::ViewAuditLog)?;
        Ok(self.audit.list(filter)?)
    }

    /// Unguarded scan shared by the reports and the sweep job.
    ///
    /// Each table is read once up front so the scan works from a consistent
    /// copy instead of re-locking per product.
    pub(crate) fn scan_low_stock(&self, warehouse_id: Option<WarehouseId>) -> DomainResult<LowStockScan> {
        let products = self.products.list()?;
        let warehouses: HashSet<WarehouseId> = self.warehouses.list()?.into_iter().map(|w| w.id).collect();
        let balances: HashMap<BalanceKey, u64> = self
            .balances
            .snapshot(None)?
            .into_iter()
            .map(|b| (b.key(), b.quantity))
            .collect();

        let result = scan(
            &products,
            warehouse_id,
            |w| warehouses.contains(&w),
            |p, w| balances.get(&BalanceKey::new(p, w)).copied().unwrap_or(0),
        );
        for product_id in &result.skipped {
            warn!(%product_id, "low-stock scan skipped product with missing warehouse");
        }
        Ok(result)
    }
}
