//! Supply / shipment orders.
//!
//! Orders are planning records only: nothing in this crate touches stock
//! balances. Pure domain logic (no IO, no storage).

pub mod order;

pub use order::{NewOrder, Order, OrderStatus, OrderType};
