//! Physical inventory counts. A side channel: discrepancies are recorded and
//! reported, never applied to balances.

use chrono::Utc;
use tracing::{info, instrument};

use depot_auth::{Action, Principal};
use depot_core::{CountId, DomainResult, Entity};
use depot_inventory::{BalanceKey, InventoryCount, NewInventoryCount};

use crate::audit::NewAuditEntry;
use crate::effects::SideEffects;
use crate::notifications::NotificationCategory;

use super::Depot;

impl Depot {
    /// Record a count. Without an explicit `recorded_quantity` the current
    /// balance for the pair is used.
    #[instrument(
        skip(self, principal, input),
        fields(user = %principal.username, product_id = %input.product_id, warehouse_id = %input.warehouse_id),
        err
    )]
    pub fn create_inventory_count(&self, principal: &Principal, input: NewInventoryCount) -> DomainResult<InventoryCount> {
        self.guard(principal, Action::CreateInventoryCount)?;
        let gate = self.catalog_shared()?;
        let product = self.products.require(input.product_id)?;
        let warehouse = self.warehouses.require(input.warehouse_id)?;

        let recorded = match input.recorded_quantity {
            Some(recorded) => recorded,
            None => self.balances.get_balance(BalanceKey::new(product.id, warehouse.id))?,
        };
        let count = InventoryCount::new(
            warehouse.id,
            product.id,
            recorded,
            input.actual_quantity,
            Some(principal.user_id),
            Utc::now(),
        )?;

        let count = self.counts.insert_with(count, |c, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_inventory",
                c,
                format!(
                    "Counted {} of {} in {} (recorded {}, discrepancy {})",
                    c.actual_quantity(),
                    product.sku,
                    warehouse.name,
                    c.recorded_quantity(),
                    c.discrepancy()
                ),
            ))
        })?;
        drop(gate);
        info!(count_id = %count.id(), discrepancy = count.discrepancy(), "inventory count recorded");

        if count.discrepancy() != 0 {
            let mut fx = SideEffects::new();
            fx.notify(
                principal.user_id,
                format!(
                    "Inventory discrepancy for {} in {}: {:+}",
                    product.name,
                    warehouse.name,
                    count.discrepancy()
                ),
                NotificationCategory::Inventory,
            );
            self.finish(fx);
        }
        Ok(count)
    }

    /// Replace both quantities of a count; the discrepancy is recomputed.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn update_inventory_count(
        &self,
        principal: &Principal,
        count_id: CountId,
        recorded_quantity: u64,
        actual_quantity: u64,
    ) -> DomainResult<InventoryCount> {
        self.guard(principal, Action::UpdateInventoryCount)?;
        self.counts.update(count_id, |c, _| {
            c.recount(recorded_quantity, actual_quantity, Utc::now())?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_inventory",
                c,
                format!("Recounted: recorded {recorded_quantity}, actual {actual_quantity}"),
            ))
        })
    }

    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn delete_inventory_count(&self, principal: &Principal, count_id: CountId) -> DomainResult<InventoryCount> {
        self.guard(principal, Action::DeleteInventoryCount)?;
        self.counts.remove_with(count_id, |c, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "delete_inventory",
                c,
                format!("Deleted count with discrepancy {}", c.discrepancy()),
            ))
        })
    }

    pub fn inventory_count(&self, principal: &Principal, count_id: CountId) -> DomainResult<InventoryCount> {
        self.guard(principal, Action::ViewInventoryCounts)?;
        self.counts.require(count_id)
    }

    /// Counts, newest first.
    pub fn inventory_counts(&self, principal: &Principal) -> DomainResult<Vec<InventoryCount>> {
        self.guard(principal, Action::ViewInventoryCounts)?;
        let mut all = self.counts.list()?;
        all.sort_by_key(|c| std::cmp::Reverse(c.created_at()));
        Ok(all)
    }
}
