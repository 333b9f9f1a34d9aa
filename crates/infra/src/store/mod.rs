//! In-memory durable state.
//!
//! - `table`: keyed record tables for catalog/order/count/user records
//! - `balances`: the Balance Store, with one lock per (product, warehouse) row
//! - `journal`: the append-only ledger of movements and transfers

pub mod balances;
pub mod journal;
pub mod table;

pub use balances::{BalanceRows, BalanceStore, BalanceTxn};
pub use journal::Journal;
pub use table::EntityTable;
