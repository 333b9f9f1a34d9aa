//! Infrastructure layer: stores, collaborators, configuration and the
//! application services built on them.

pub mod audit;
pub mod cache;
pub mod config;
pub mod effects;
pub mod jobs;
pub mod notifications;
pub mod postgres;
pub mod services;
pub mod store;

mod integration_tests;

pub use audit::{AuditEntry, AuditFilter, AuditTrail, InMemoryAuditTrail};
pub use cache::{CacheInvalidator, CacheScope};
pub use config::{DepotConfig, DepotSettings, WarehouseDeletePolicy};
pub use jobs::{LowStockSweep, SweepReport};
pub use notifications::{InMemoryNotificationStore, Notification, NotificationCategory, Notifier};
pub use services::catalog::ProductFilter;
pub use services::{AnalyticsSummary, Depot};
