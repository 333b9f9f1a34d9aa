//! Stock operation workflow and transfer coordinator.

use chrono::Utc;
use tracing::{info, instrument, warn};

use depot_auth::{Action, Principal};
use depot_catalog::{Product, Warehouse};
use depot_core::{DomainError, DomainResult, ProductId, TransferId, UserId, WarehouseId};
use depot_inventory::{
    BalanceKey, MovementKind, MovementRequest, StockBalance, StockMovement, StockTransfer, TransferRequest,
    apply_delta, evaluate, plan_transfer,
};

use crate::audit::NewAuditEntry;
use crate::cache::CacheScope;
use crate::effects::SideEffects;
use crate::notifications::NotificationCategory;

use super::Depot;

impl Depot {
    /// Record an income or outcome and apply it to the balance.
    ///
    /// The ledger entry, the balance update and the audit entry commit
    /// together or not at all.
    #[instrument(
        skip(self, principal, request),
        fields(
            user = %principal.username,
            product_id = %request.product_id,
            warehouse_id = %request.warehouse_id,
            kind = request.kind.as_str(),
            quantity = request.quantity
        ),
        err
    )]
    pub fn perform_movement(&self, principal: &Principal, request: MovementRequest) -> DomainResult<StockMovement> {
        self.guard(principal, Action::RecordMovement)?;
        let quantity = request.validate()?;
        let key = BalanceKey::new(request.product_id, request.warehouse_id);

        let gate = self.catalog_shared()?;
        // Resolved before any row slot is created; the gate keeps both alive.
        let warehouse = self.warehouses.require(request.warehouse_id)?;
        let product = self.products.require(request.product_id)?;

        let rows = self.balances.rows_for(&[key])?;
        let mut txn = rows.lock()?;
        let current = txn.quantity(key)?;
        let next = apply_delta(current, request.kind.signed(quantity)).inspect_err(|err| {
            warn!(current, error = %err, "movement rejected");
        })?;
        txn.stage(key, next)?;

        let now = Utc::now();
        let movement = StockMovement::record(
            product.id,
            warehouse.id,
            request.kind,
            quantity,
            Some(principal.user_id),
            now,
        );

        self.record(NewAuditEntry::for_entity(
            Some(principal.user_id),
            movement_action(request.kind),
            &movement,
            format!(
                "{} {} {} of {} at {} (balance {} -> {})",
                principal.username,
                movement_action(request.kind),
                quantity,
                product.sku,
                warehouse.name,
                current,
                next
            ),
        ))?;
        self.journal.append_movement(movement.clone());
        txn.commit(now);
        drop(gate);

        info!(movement_id = %movement.id, balance = next, "movement committed");

        let mut fx = SideEffects::new();
        self.low_stock_check(&mut fx, &product, &warehouse, next, principal.user_id);
        fx.invalidate(CacheScope::StockMovements).invalidate(CacheScope::StockBalance);
        self.finish(fx);
        Ok(movement)
    }

    /// Move stock between two warehouses: debit and credit commit together.
    #[instrument(
        skip(self, principal, request),
        fields(
            user = %principal.username,
            product_id = %request.product_id,
            from = %request.from_warehouse_id,
            to = %request.to_warehouse_id,
            quantity = request.quantity
        ),
        err
    )]
    pub fn perform_transfer(&self, principal: &Principal, request: TransferRequest) -> DomainResult<StockTransfer> {
        self.guard(principal, Action::CreateTransfer)?;
        self.execute_transfer(principal, request, None)
    }

    /// Undo a transfer with an offsetting one. Each transfer can be reversed once.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn reverse_transfer(&self, principal: &Principal, transfer_id: TransferId) -> DomainResult<StockTransfer> {
        self.guard(principal, Action::ReverseTransfer)?;
        let original = self
            .journal
            .transfer(transfer_id)?
            .ok_or(DomainError::NotFound("StockTransfer"))?;
        if original.reverses.is_some() {
            return Err(DomainError::conflict("a reversal cannot itself be reversed"));
        }
        if let Some(existing) = self.journal.reversal_of(original.id)? {
            return Err(already_reversed(original.id, existing));
        }
        self.execute_transfer(principal, original.reversal(), Some(original.id))
    }

    fn execute_transfer(
        &self,
        principal: &Principal,
        request: TransferRequest,
        reverses: Option<TransferId>,
    ) -> DomainResult<StockTransfer> {
        let quantity = request.validate()?;
        let source = BalanceKey::new(request.product_id, request.from_warehouse_id);
        let destination = BalanceKey::new(request.product_id, request.to_warehouse_id);

        let gate = self.catalog_shared()?;
        let product = self.products.require(request.product_id)?;
        let from = self.warehouses.require(request.from_warehouse_id)?;
        let to = self.warehouses.require(request.to_warehouse_id)?;

        // rows_for sorts the keys, so both directions lock in the same order.
        let rows = self.balances.rows_for(&[source, destination])?;
        let mut txn = rows.lock()?;
        // Every reversal of a transfer locks these same two rows, so this
        // check cannot race another reversal of the same transfer.
        if let Some(original) = reverses {
            if let Some(existing) = self.journal.reversal_of(original)? {
                return Err(already_reversed(original, existing));
            }
        }

        let plan = plan_transfer(txn.quantity(source)?, txn.quantity(destination)?, quantity).inspect_err(|err| {
            warn!(error = %err, "transfer rejected");
        })?;
        txn.stage(source, plan.source_after)?;
        txn.stage(destination, plan.destination_after)?;

        let now = Utc::now();
        let transfer = StockTransfer {
            id: TransferId::new(),
            product_id: product.id,
            from_warehouse_id: from.id,
            to_warehouse_id: to.id,
            quantity,
            reverses,
            created_by: Some(principal.user_id),
            created_at: now,
        };

        let action = if reverses.is_some() { "reverse_transfer" } else { "create_transfer" };
        self.record(NewAuditEntry::for_entity(
            Some(principal.user_id),
            action,
            &transfer,
            format!(
                "{} moved {} of {} from {} to {}",
                principal.username, quantity, product.sku, from.name, to.name
            ),
        ))?;
        self.journal.append_transfer(transfer.clone());
        txn.commit(now);
        drop(gate);

        info!(
            transfer_id = %transfer.id,
            source_balance = plan.source_after,
            destination_balance = plan.destination_after,
            "transfer committed"
        );

        // Only the source can have dropped.
        let mut fx = SideEffects::new();
        self.low_stock_check(&mut fx, &product, &from, plan.source_after, principal.user_id);
        fx.invalidate(CacheScope::StockMovements).invalidate(CacheScope::StockBalance);
        self.finish(fx);
        Ok(transfer)
    }

    pub(crate) fn low_stock_check(
        &self,
        fx: &mut SideEffects,
        product: &Product,
        warehouse: &Warehouse,
        balance: u64,
        actor: UserId,
    ) {
        if !self.settings.low_stock_notify {
            return;
        }
        if let Some(alert) = evaluate(product, warehouse.id, &warehouse.name, balance) {
            info!(product_id = %product.id, balance, min_stock = product.min_stock, "low stock");
            fx.notify(alert.recipient.unwrap_or(actor), alert.message, NotificationCategory::LowStock);
        }
    }

    pub fn balance(&self, principal: &Principal, product_id: ProductId, warehouse_id: WarehouseId) -> DomainResult<u64> {
        self.guard(principal, Action::ViewStock)?;
        self.balances.get_balance(BalanceKey::new(product_id, warehouse_id))
    }

    /// Committed balances, for one product or all of them.
    pub fn balances(&self, principal: &Principal, product_id: Option<ProductId>) -> DomainResult<Vec<StockBalance>> {
        self.guard(principal, Action::ViewStock)?;
        self.balances.snapshot(product_id)
    }

    /// Ledger entries for a product, oldest first. History outlives the product.
    pub fn movement_history(
        &self,
        principal: &Principal,
        product_id: ProductId,
        kind: Option<MovementKind>,
    ) -> DomainResult<Vec<StockMovement>> {
        self.guard(principal, Action::ViewStock)?;
        self.journal
            .movements(|m| m.product_id == product_id && kind.is_none_or(|k| m.kind == k))
    }

    pub fn transfers(&self, principal: &Principal) -> DomainResult<Vec<StockTransfer>> {
        self.guard(principal, Action::ViewTransfers)?;
        self.journal.transfers()
    }

    pub fn transfer(&self, principal: &Principal, transfer_id: TransferId) -> DomainResult<StockTransfer> {
        self.guard(principal, Action::ViewTransfers)?;
        self.journal
            .transfer(transfer_id)?
            .ok_or(DomainError::NotFound("StockTransfer"))
    }

    /// Net of the ledger for a pair. For reconciliation; reads use the balance.
    pub fn ledger_net(&self, principal: &Principal, product_id: ProductId, warehouse_id: WarehouseId) -> DomainResult<i128> {
        self.guard(principal, Action::ViewStock)?;
        self.journal.net(BalanceKey::new(product_id, warehouse_id))
    }
}

fn movement_action(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::In => "income",
        MovementKind::Out => "outcome",
    }
}

fn already_reversed(original: TransferId, existing: TransferId) -> DomainError {
    DomainError::conflict(format!("transfer {original} was already reversed by {existing}"))
}
