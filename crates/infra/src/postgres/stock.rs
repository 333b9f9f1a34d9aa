//! Stock movements and transfers against Postgres.
//!
//! Same workflow as the in-memory `Depot`, with the database doing the
//! locking: every touched `stock_balances` row is taken with
//! `SELECT … FOR UPDATE` in ascending `(product_id, warehouse_id)` order, and
//! the balance update, ledger rows and audit row share one transaction.
//! Low-stock notifications and cache signals go out after commit and never
//! fail the operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use depot_auth::{Action, Principal, authorize};
use depot_core::{DomainError, DomainResult, Entity, TransferId, UserId, WarehouseId};
use depot_inventory::{
    BalanceKey, MovementKind, MovementRequest, StockMovement, StockTransfer, TransferRequest, apply_delta, is_low,
    low_stock_message, plan_transfer,
};

use super::{PgStoreError, map_sqlx_error};
use crate::audit::NewAuditEntry;
use crate::cache::{CacheInvalidator, CacheScope, NoopCache};
use crate::config::DepotSettings;
use crate::effects::SideEffects;
use crate::notifications::{InMemoryNotificationStore, NotificationCategory, Notifier};

#[derive(Clone)]
pub struct PgStockStore {
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn CacheInvalidator>,
    settings: DepotSettings,
}

struct ProductRow {
    name: String,
    sku: String,
    min_stock: u64,
    created_by: Option<UserId>,
}

impl PgStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            notifier: Arc::new(InMemoryNotificationStore::new()),
            cache: Arc::new(NoopCache),
            settings: DepotSettings::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_settings(mut self, settings: DepotSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Committed quantity; zero for a pair that never held stock.
    pub async fn balance(&self, key: BalanceKey) -> Result<u64, PgStoreError> {
        let row = sqlx::query("SELECT quantity FROM stock_balances WHERE product_id = $1 AND warehouse_id = $2")
            .bind(key.product_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("balance", e))?;
        match row {
            Some(row) => to_quantity(row.try_get("quantity").map_err(|e| map_sqlx_error("balance", e))?),
            None => Ok(0),
        }
    }

    #[instrument(
        skip(self, principal, request),
        fields(
            user = %principal.username,
            product_id = %request.product_id,
            warehouse_id = %request.warehouse_id,
            kind = request.kind.as_str()
        ),
        err
    )]
    pub async fn perform_movement(&self, principal: &Principal, request: MovementRequest) -> DomainResult<StockMovement> {
        authorize(Some(principal), Action::RecordMovement)?;
        let quantity = request.validate()?;
        let key = BalanceKey::new(request.product_id, request.warehouse_id);

        let mut tx = self.begin().await?;
        let product = fetch_product(&mut tx, key).await?;
        let warehouse_name = fetch_warehouse_name(&mut tx, key.warehouse_id).await?;

        let balances = lock_rows(&mut tx, &[key]).await?;
        let current = balances.get(&key).copied().unwrap_or(0);
        let next = apply_delta(current, request.kind.signed(quantity)).inspect_err(|err| {
            warn!(error = %err, "movement rejected");
        })?;

        let now = Utc::now();
        let movement = StockMovement::record(
            key.product_id,
            key.warehouse_id,
            request.kind,
            quantity,
            Some(principal.user_id),
            now,
        );
        write_balance(&mut tx, key, next, now).await?;
        insert_movement(&mut tx, &movement).await?;
        let action = match request.kind {
            MovementKind::In => "income",
            MovementKind::Out => "outcome",
        };
        insert_audit(
            &mut tx,
            NewAuditEntry::for_entity(
                Some(principal.user_id),
                action,
                &movement,
                format!("{} {} {} of {}", principal.username, action, quantity, product.sku),
            ),
            audit_payload(&movement),
            now,
        )
        .await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        info!(movement_id = %movement.id, balance = next, "movement committed");
        let mut fx = SideEffects::new();
        if self.settings.low_stock_notify {
            low_stock_check(&mut fx, &product, &warehouse_name, next, principal.user_id);
        }
        fx.invalidate(CacheScope::StockMovements).invalidate(CacheScope::StockBalance);
        fx.dispatch(self.notifier.as_ref(), self.cache.as_ref());
        Ok(movement)
    }

    #[instrument(
        skip(self, principal, request),
        fields(
            user = %principal.username,
            product_id = %request.product_id,
            from = %request.from_warehouse_id,
            to = %request.to_warehouse_id
        ),
        err
    )]
    pub async fn perform_transfer(&self, principal: &Principal, request: TransferRequest) -> DomainResult<StockTransfer> {
        authorize(Some(principal), Action::CreateTransfer)?;
        let quantity = request.validate()?;
        let source = BalanceKey::new(request.product_id, request.from_warehouse_id);
        let destination = BalanceKey::new(request.product_id, request.to_warehouse_id);

        let mut tx = self.begin().await?;
        let product = fetch_product(&mut tx, source).await?;
        let source_name = fetch_warehouse_name(&mut tx, source.warehouse_id).await?;
        fetch_warehouse_name(&mut tx, destination.warehouse_id).await?;

        let balances = lock_rows(&mut tx, &[source, destination]).await?;
        let plan = plan_transfer(
            balances.get(&source).copied().unwrap_or(0),
            balances.get(&destination).copied().unwrap_or(0),
            quantity,
        )
        .inspect_err(|err| {
            warn!(error = %err, "transfer rejected");
        })?;

        let now = Utc::now();
        let transfer = StockTransfer {
            id: TransferId::new(),
            product_id: request.product_id,
            from_warehouse_id: source.warehouse_id,
            to_warehouse_id: destination.warehouse_id,
            quantity,
            reverses: None,
            created_by: Some(principal.user_id),
            created_at: now,
        };
        write_balance(&mut tx, source, plan.source_after, now).await?;
        write_balance(&mut tx, destination, plan.destination_after, now).await?;
        insert_transfer(&mut tx, &transfer).await?;
        for leg in transfer.legs() {
            insert_movement(&mut tx, &leg).await?;
        }
        insert_audit(
            &mut tx,
            NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_transfer",
                &transfer,
                format!("{} moved {} of {}", principal.username, quantity, product.sku),
            ),
            audit_payload(&transfer),
            now,
        )
        .await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        info!(
            transfer_id = %transfer.id(),
            source_balance = plan.source_after,
            destination_balance = plan.destination_after,
            "transfer committed"
        );
        // Only the source can have dropped.
        let mut fx = SideEffects::new();
        if self.settings.low_stock_notify {
            low_stock_check(&mut fx, &product, &source_name, plan.source_after, principal.user_id);
        }
        fx.invalidate(CacheScope::StockMovements).invalidate(CacheScope::StockBalance);
        fx.dispatch(self.notifier.as_ref(), self.cache.as_ref());
        Ok(transfer)
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, PgStoreError> {
        self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Queue a low-stock notification for the product's creator, or `actor` when
/// the creator is unknown.
fn low_stock_check(fx: &mut SideEffects, product: &ProductRow, warehouse_name: &str, balance: u64, actor: UserId) {
    if !is_low(balance, product.min_stock) {
        return;
    }
    info!(balance, min_stock = product.min_stock, "low stock");
    fx.notify(
        product.created_by.unwrap_or(actor),
        low_stock_message(&product.name, warehouse_name, balance),
        NotificationCategory::LowStock,
    );
}

/// Lock (creating at zero if needed) every row in `keys`, in key order.
async fn lock_rows(
    tx: &mut Transaction<'_, Postgres>,
    keys: &[BalanceKey],
) -> Result<BTreeMap<BalanceKey, u64>, PgStoreError> {
    let mut ordered = keys.to_vec();
    ordered.sort();
    ordered.dedup();

    let mut locked = BTreeMap::new();
    for key in ordered {
        sqlx::query(
            r#"
            INSERT INTO stock_balances (product_id, warehouse_id, quantity)
            VALUES ($1, $2, 0)
            ON CONFLICT (product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("create_balance_row", e))?;

        let row = sqlx::query(
            r#"
            SELECT quantity FROM stock_balances
            WHERE product_id = $1 AND warehouse_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_balance_row", e))?;
        let quantity = to_quantity(row.try_get("quantity").map_err(|e| map_sqlx_error("lock_balance_row", e))?)?;
        locked.insert(key, quantity);
    }
    Ok(locked)
}

async fn fetch_product(tx: &mut Transaction<'_, Postgres>, key: BalanceKey) -> DomainResult<ProductRow> {
    let row = sqlx::query("SELECT name, sku, min_stock, created_by FROM products WHERE id = $1")
        .bind(key.product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", e))?
        .ok_or(DomainError::NotFound("Product"))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("fetch_product", e))?;
    let sku: String = row.try_get("sku").map_err(|e| map_sqlx_error("fetch_product", e))?;
    let min_stock: i64 = row.try_get("min_stock").map_err(|e| map_sqlx_error("fetch_product", e))?;
    let created_by: Option<Uuid> = row.try_get("created_by").map_err(|e| map_sqlx_error("fetch_product", e))?;
    Ok(ProductRow {
        name,
        sku,
        min_stock: to_quantity(min_stock)?,
        created_by: created_by.map(UserId::from),
    })
}

async fn fetch_warehouse_name(tx: &mut Transaction<'_, Postgres>, id: WarehouseId) -> DomainResult<String> {
    let row = sqlx::query("SELECT name FROM warehouses WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_warehouse", e))?
        .ok_or(DomainError::NotFound("Warehouse"))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("fetch_warehouse", e))?;
    Ok(name)
}

async fn write_balance(
    tx: &mut Transaction<'_, Postgres>,
    key: BalanceKey,
    quantity: u64,
    now: DateTime<Utc>,
) -> Result<(), PgStoreError> {
    let quantity = i64::try_from(quantity).map_err(|_| PgStoreError::Constraint(format!("balance {quantity} out of range")))?;
    sqlx::query(
        r#"
        UPDATE stock_balances SET quantity = $3, updated_at = $4
        WHERE product_id = $1 AND warehouse_id = $2
        "#,
    )
    .bind(key.product_id.as_uuid())
    .bind(key.warehouse_id.as_uuid())
    .bind(quantity)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("write_balance", e))?;
    Ok(())
}

async fn insert_movement(tx: &mut Transaction<'_, Postgres>, movement: &StockMovement) -> Result<(), PgStoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, warehouse_id, kind, quantity, transfer_id, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.warehouse_id.as_uuid())
    .bind(movement.kind.as_str())
    .bind(movement.quantity.as_i64())
    .bind(movement.transfer_id.map(Uuid::from))
    .bind(movement.created_by.map(Uuid::from))
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

async fn insert_transfer(tx: &mut Transaction<'_, Postgres>, transfer: &StockTransfer) -> Result<(), PgStoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_transfers (
            id, product_id, from_warehouse_id, to_warehouse_id, quantity, reverses, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(transfer.id.as_uuid())
    .bind(transfer.product_id.as_uuid())
    .bind(transfer.from_warehouse_id.as_uuid())
    .bind(transfer.to_warehouse_id.as_uuid())
    .bind(transfer.quantity.as_i64())
    .bind(transfer.reverses.map(Uuid::from))
    .bind(transfer.created_by.map(Uuid::from))
    .bind(transfer.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transfer", e))?;
    Ok(())
}

async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    entry: NewAuditEntry,
    payload: Option<serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<(), PgStoreError> {
    let entry = entry.stamp(now);
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, actor_id, action, model_name, object_id, details, payload, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.actor.map(Uuid::from))
    .bind(&entry.action)
    .bind(&entry.model_name)
    .bind(&entry.object_id)
    .bind(&entry.details)
    .bind(payload)
    .bind(entry.timestamp)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_audit", e))?;
    Ok(())
}

/// JSON copy of the record for the audit row. A record that fails to
/// serialize is still audited, just without the payload.
fn audit_payload<T: Serialize>(record: &T) -> Option<serde_json::Value> {
    serde_json::to_value(record)
        .inspect_err(|err| warn!(error = %err, "audit payload dropped"))
        .ok()
}

fn to_quantity(raw: i64) -> Result<u64, PgStoreError> {
    u64::try_from(raw).map_err(|_| PgStoreError::Constraint(format!("negative quantity {raw} in database")))
}
