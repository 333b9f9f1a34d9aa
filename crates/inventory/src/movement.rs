use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, Entity, MovementId, ProductId, Timestamped, TransferId, UserId, WarehouseId};

use crate::Quantity;

/// Direction of a ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Income / receipt.
    In,
    /// Outcome / issue.
    Out,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
        }
    }

    pub fn signed(&self, quantity: Quantity) -> i64 {
        match self {
            MovementKind::In => quantity.as_i64(),
            MovementKind::Out => -quantity.as_i64(),
        }
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" | "income" => Ok(MovementKind::In),
            "out" | "outcome" => Ok(MovementKind::Out),
            other => Err(DomainError::validation(format!(
                "operation must be 'in' or 'out', got '{other}'"
            ))),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry: one immutable stock increase or decrease.
///
/// Entries are never edited; corrections are new offsetting entries. Entries
/// produced by a transfer carry its `transfer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub transfer_id: Option<TransferId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Build a ledger entry. Never fails: the quantity is already validated
    /// and balance sufficiency is the caller's business.
    pub fn record(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        kind: MovementKind,
        quantity: Quantity,
        created_by: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            product_id,
            warehouse_id,
            kind,
            quantity,
            transfer_id: None,
            created_by,
            created_at,
        }
    }

    pub fn signed_delta(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

impl Entity for StockMovement {
    type Id = MovementId;
    const MODEL_NAME: &'static str = "StockMovement";

    fn id(&self) -> MovementId {
        self.id
    }
}

impl Timestamped for StockMovement {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Raw income/outcome request, as a caller would submit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: u64,
}

impl MovementRequest {
    pub fn validate(&self) -> Result<Quantity, DomainError> {
        Quantity::new(self.quantity)
    }
}
