//! Background jobs.
//!
//! Only the trigger interface lives here; scheduling (cron, tokio interval,
//! an external runner) is whoever calls `run_once`.

pub mod low_stock_sweep;

pub use low_stock_sweep::{LowStockSweep, SweepReport};
