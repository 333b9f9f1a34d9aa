//! Catalog records: products, warehouses and categories.
//!
//! Validation and update rules only. Uniqueness across records (SKU) and
//! referential checks need the stores and live in `depot-infra`.

pub mod category;
pub mod product;
pub mod warehouse;

pub use category::{Category, CategoryUpdate, NewCategory, would_create_cycle};
pub use product::{NewProduct, Product, ProductUpdate, Sku};
pub use warehouse::{NewWarehouse, Warehouse, WarehouseType, WarehouseUpdate};
