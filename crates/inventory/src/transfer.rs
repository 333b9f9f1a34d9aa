use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, Entity, MovementId, ProductId, Timestamped, TransferId, UserId, WarehouseId};

use crate::{MovementKind, Quantity, StockMovement, apply_delta};

/// A completed move of stock between two warehouses.
///
/// Backed by two ledger entries (an `out` at the source, an `in` at the
/// destination) that carry this transfer's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: TransferId,
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: Quantity,
    /// Set when this transfer offsets an earlier one.
    pub reverses: Option<TransferId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl StockTransfer {
    /// The debit and credit ledger entries for this transfer, in that order.
    pub fn legs(&self) -> [StockMovement; 2] {
        let leg = |warehouse_id, kind| StockMovement {
            id: MovementId::new(),
            product_id: self.product_id,
            warehouse_id,
            kind,
            quantity: self.quantity,
            transfer_id: Some(self.id),
            created_by: self.created_by,
            created_at: self.created_at,
        };
        [
            leg(self.from_warehouse_id, MovementKind::Out),
            leg(self.to_warehouse_id, MovementKind::In),
        ]
    }

    /// Request that moves the same quantity back.
    pub fn reversal(&self) -> TransferRequest {
        TransferRequest {
            product_id: self.product_id,
            from_warehouse_id: self.to_warehouse_id,
            to_warehouse_id: self.from_warehouse_id,
            quantity: self.quantity.get(),
        }
    }
}

impl Entity for StockTransfer {
    type Id = TransferId;
    const MODEL_NAME: &'static str = "StockTransfer";

    fn id(&self) -> TransferId {
        self.id
    }
}

impl Timestamped for StockTransfer {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: u64,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<Quantity, DomainError> {
        if self.from_warehouse_id == self.to_warehouse_id {
            return Err(DomainError::validation(
                "source and destination warehouses must differ",
            ));
        }
        Quantity::new(self.quantity)
    }
}

/// Post-transfer balances for both rows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub source_after: u64,
    pub destination_after: u64,
}

/// Decide both sides of a transfer. Either both balances change or the
/// whole plan is rejected.
pub fn plan_transfer(source: u64, destination: u64, quantity: Quantity) -> Result<TransferPlan, DomainError> {
    let source_after = apply_delta(source, -quantity.as_i64())?;
    let destination_after = apply_delta(destination, quantity.as_i64())?;
    Ok(TransferPlan {
        source_after,
        destination_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_QUANTITY;
    use proptest::prelude::*;

    fn qty(n: u64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn same_warehouse_is_rejected() {
        let wh = WarehouseId::new();
        let req = TransferRequest {
            product_id: ProductId::new(),
            from_warehouse_id: wh,
            to_warehouse_id: wh,
            quantity: 3,
        };
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn plan_moves_quantity() {
        let plan = plan_transfer(20, 0, qty(15)).unwrap();
        assert_eq!(plan, TransferPlan { source_after: 5, destination_after: 15 });
    }

    #[test]
    fn plan_rejects_insufficient_source() {
        assert!(matches!(
            plan_transfer(4, 0, qty(5)),
            Err(DomainError::InsufficientStock { requested: 5, available: 4 })
        ));
    }

    #[test]
    fn plan_rejects_destination_overflow() {
        assert!(matches!(
            plan_transfer(10, MAX_QUANTITY, qty(1)),
            Err(DomainError::Internal(_))
        ));
    }

    #[test]
    fn legs_are_debit_then_credit_and_tagged() {
        let transfer = StockTransfer {
            id: TransferId::new(),
            product_id: ProductId::new(),
            from_warehouse_id: WarehouseId::new(),
            to_warehouse_id: WarehouseId::new(),
            quantity: qty(4),
            reverses: None,
            created_by: None,
            created_at: Utc::now(),
        };
        let [out, inn] = transfer.legs();
        assert_eq!(out.warehouse_id, transfer.from_warehouse_id);
        assert_eq!(out.signed_delta(), -4);
        assert_eq!(inn.warehouse_id, transfer.to_warehouse_id);
        assert_eq!(inn.signed_delta(), 4);
        assert_eq!(out.transfer_id, Some(transfer.id));

        let back = transfer.reversal();
        assert_eq!(back.from_warehouse_id, transfer.to_warehouse_id);
        assert_eq!(back.quantity, 4);
    }

    proptest! {
        /// A transfer conserves the total across both rows.
        #[test]
        fn transfer_conserves_total(src in 0u64..10_000, dst in 0u64..10_000, q in 1u64..10_000) {
            match plan_transfer(src, dst, qty(q)) {
                Ok(plan) => {
                    prop_assert_eq!(plan.source_after + plan.destination_after, src + dst);
                }
                Err(DomainError::InsufficientStock { requested, available }) => {
                    prop_assert_eq!(requested, q);
                    prop_assert_eq!(available, src);
                    prop_assert!(src < q);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
