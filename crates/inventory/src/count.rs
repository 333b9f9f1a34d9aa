//! Inventory (physical) counts.
//!
//! A count records what the system believed (`recorded_quantity`) next to
//! what was physically found (`actual_quantity`). The discrepancy is always
//! derived; it has no setter and is recomputed on deserialization.
//! Counts never feed back into balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{CountId, DomainError, Entity, ProductId, UserId, WarehouseId};

use crate::MAX_QUANTITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CountRecord")]
pub struct InventoryCount {
    id: CountId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    recorded_quantity: u64,
    actual_quantity: u64,
    discrepancy: i64,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Shape accepted on the way in; any incoming `discrepancy` is ignored.
#[derive(Deserialize)]
struct CountRecord {
    id: CountId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    recorded_quantity: u64,
    actual_quantity: u64,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CountRecord> for InventoryCount {
    type Error = DomainError;

    fn try_from(r: CountRecord) -> Result<Self, Self::Error> {
        check_bounds(r.recorded_quantity, r.actual_quantity)?;
        Ok(Self {
            id: r.id,
            warehouse_id: r.warehouse_id,
            product_id: r.product_id,
            recorded_quantity: r.recorded_quantity,
            actual_quantity: r.actual_quantity,
            discrepancy: discrepancy(r.recorded_quantity, r.actual_quantity),
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Input for a new count. `recorded_quantity: None` means "snapshot the
/// current balance", which the caller resolves before calling [`InventoryCount::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryCount {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    #[serde(default)]
    pub recorded_quantity: Option<u64>,
    pub actual_quantity: u64,
}

impl InventoryCount {
    pub fn new(
        warehouse_id: WarehouseId,
        product_id: ProductId,
        recorded_quantity: u64,
        actual_quantity: u64,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        check_bounds(recorded_quantity, actual_quantity)?;
        Ok(Self {
            id: CountId::new(),
            warehouse_id,
            product_id,
            recorded_quantity,
            actual_quantity,
            discrepancy: discrepancy(recorded_quantity, actual_quantity),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the quantities; the discrepancy follows.
    pub fn recount(&mut self, recorded_quantity: u64, actual_quantity: u64, now: DateTime<Utc>) -> Result<(), DomainError> {
        check_bounds(recorded_quantity, actual_quantity)?;
        self.recorded_quantity = recorded_quantity;
        self.actual_quantity = actual_quantity;
        self.discrepancy = discrepancy(recorded_quantity, actual_quantity);
        self.updated_at = now;
        Ok(())
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn recorded_quantity(&self) -> u64 {
        self.recorded_quantity
    }

    pub fn actual_quantity(&self) -> u64 {
        self.actual_quantity
    }

    /// `actual - recorded`.
    pub fn discrepancy(&self) -> i64 {
        self.discrepancy
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for InventoryCount {
    type Id = CountId;
    const MODEL_NAME: &'static str = "Inventory";

    fn id(&self) -> CountId {
        self.id
    }
}

fn check_bounds(recorded: u64, actual: u64) -> Result<(), DomainError> {
    if recorded > MAX_QUANTITY || actual > MAX_QUANTITY {
        return Err(DomainError::validation("count quantity is too large"));
    }
    Ok(())
}

// Both operands are <= i64::MAX, so the difference fits.
fn discrepancy(recorded: u64, actual: u64) -> i64 {
    actual as i64 - recorded as i64
}
