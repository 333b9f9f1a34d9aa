//! Periodic low-stock sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument};

use depot_core::{DomainResult, ProductId, WarehouseId};
use depot_inventory::evaluate;

use crate::effects::SideEffects;
use crate::notifications::NotificationCategory;
use crate::services::Depot;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub products_low: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Low products with no creator to notify.
    pub unaddressed: Vec<ProductId>,
    /// Products whose primary warehouse no longer exists.
    pub skipped: Vec<ProductId>,
    pub elapsed_ms: u64,
}

/// Scans every product at its primary warehouse and notifies the creator of
/// each one at or below its minimum.
///
/// Runs as the system: there is no principal and no access check.
pub struct LowStockSweep {
    depot: Arc<Depot>,
}

impl LowStockSweep {
    pub fn new(depot: Arc<Depot>) -> Self {
        Self { depot }
    }

    #[instrument(name = "low_stock_sweep", skip(self), err)]
    pub fn run_once(&self, warehouse_id: Option<WarehouseId>) -> DomainResult<SweepReport> {
        let started = Instant::now();
        let scan = self.depot.scan_low_stock(warehouse_id)?;
        let products: HashMap<ProductId, _> = self.depot.products.list()?.into_iter().map(|p| (p.id, p)).collect();
        let warehouse_names: HashMap<WarehouseId, String> =
            self.depot.warehouses.list()?.into_iter().map(|w| (w.id, w.name)).collect();

        let mut report = SweepReport {
            products_low: scan.items.len(),
            skipped: scan.skipped,
            ..SweepReport::default()
        };
        let mut fx = SideEffects::new();
        for item in &scan.items {
            // Deleted between the scan and this lookup.
            let Some(product) = products.get(&item.product_id) else {
                continue;
            };
            let name = warehouse_names.get(&item.warehouse_id).map(String::as_str).unwrap_or_default();
            let Some(alert) = evaluate(product, item.warehouse_id, name, item.current_stock) else {
                continue;
            };
            match alert.recipient {
                Some(recipient) => {
                    fx.notify(recipient, alert.message, NotificationCategory::LowStock);
                }
                None => {
                    debug!(product_id = %item.product_id, "low product has no creator to notify");
                    report.unaddressed.push(item.product_id);
                }
            }
        }

        let queued = fx.notifications().len();
        report.notifications_failed = fx.dispatch(self.depot.notifier.as_ref(), self.depot.cache.as_ref());
        report.notifications_sent = queued - report.notifications_failed;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            low = report.products_low,
            sent = report.notifications_sent,
            failed = report.notifications_failed,
            skipped = report.skipped.len(),
            "low-stock sweep finished"
        );
        Ok(report)
    }
}
