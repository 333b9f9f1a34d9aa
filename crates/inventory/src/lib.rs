//! Stock rules, implemented purely as deterministic domain logic (no IO, no
//! locking, no storage).
//!
//! The Balance Store and ledger journal in `depot-infra` call into these
//! functions while holding the relevant row locks; everything here decides,
//! nothing here persists.

pub mod balance;
pub mod count;
pub mod low_stock;
pub mod movement;
pub mod quantity;
pub mod transfer;

pub use balance::{BalanceKey, StockBalance, apply_delta, ledger_net};
pub use count::{InventoryCount, NewInventoryCount};
pub use low_stock::{LowStockAlert, LowStockItem, LowStockScan, evaluate, is_low, low_stock_message, scan};
pub use movement::{MovementKind, MovementRequest, StockMovement};
pub use quantity::{MAX_QUANTITY, Quantity};
pub use transfer::{StockTransfer, TransferPlan, TransferRequest, plan_transfer};
