//! Table layout for the Postgres adapter.

use sqlx::PgPool;

use super::{PgStoreError, map_sqlx_error};

/// Idempotent DDL. Balances are non-negative at the column level as well as
/// in the workflow.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS warehouses (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL DEFAULT 'retail',
    location    TEXT NOT NULL DEFAULT '',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS products (
    id            UUID PRIMARY KEY,
    name          TEXT NOT NULL,
    sku           TEXT NOT NULL UNIQUE,
    unit          TEXT NOT NULL,
    min_stock     BIGINT NOT NULL DEFAULT 0 CHECK (min_stock >= 0),
    warehouse_id  UUID NOT NULL REFERENCES warehouses (id),
    created_by    UUID NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS stock_balances (
    product_id    UUID NOT NULL REFERENCES products (id),
    warehouse_id  UUID NOT NULL REFERENCES warehouses (id),
    quantity      BIGINT NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (product_id, warehouse_id)
);

CREATE TABLE IF NOT EXISTS stock_transfers (
    id                 UUID PRIMARY KEY,
    product_id         UUID NOT NULL REFERENCES products (id),
    from_warehouse_id  UUID NOT NULL REFERENCES warehouses (id),
    to_warehouse_id    UUID NOT NULL REFERENCES warehouses (id),
    quantity           BIGINT NOT NULL CHECK (quantity > 0),
    reverses           UUID NULL UNIQUE REFERENCES stock_transfers (id),
    created_by         UUID NULL,
    created_at         TIMESTAMPTZ NOT NULL,
    CHECK (from_warehouse_id <> to_warehouse_id)
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id            UUID PRIMARY KEY,
    product_id    UUID NOT NULL,
    warehouse_id  UUID NOT NULL,
    kind          TEXT NOT NULL CHECK (kind IN ('in', 'out')),
    quantity      BIGINT NOT NULL CHECK (quantity > 0),
    transfer_id   UUID NULL REFERENCES stock_transfers (id),
    created_by    UUID NULL,
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS stock_movements_pair_idx
    ON stock_movements (product_id, warehouse_id, created_at);

CREATE TABLE IF NOT EXISTS audit_log (
    id          UUID PRIMARY KEY,
    actor_id    UUID NULL,
    action      TEXT NOT NULL,
    model_name  TEXT NOT NULL,
    object_id   TEXT NOT NULL,
    details     TEXT NOT NULL,
    payload     JSONB NULL,
    created_at  TIMESTAMPTZ NOT NULL
);
"#;

pub async fn ensure_schema(pool: &PgPool) -> Result<(), PgStoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}
