//! Low-stock evaluation.
//!
//! One rule, used both after every balance mutation and by the bulk scan:
//! a product is low when its balance is at or below its minimum.

use serde::{Deserialize, Serialize};

use depot_catalog::{Product, Sku};
use depot_core::{ProductId, UserId, WarehouseId};

pub fn is_low(current: u64, min_stock: u64) -> bool {
    current <= min_stock
}

/// Alert raised for a single (product, warehouse) after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub current_stock: u64,
    pub min_stock: u64,
    /// Who should hear about it: the product's creator, if known.
    pub recipient: Option<UserId>,
    pub message: String,
}

/// Returns an alert when `balance` is low for `product` at `warehouse_id`.
pub fn evaluate(product: &Product, warehouse_id: WarehouseId, warehouse_name: &str, balance: u64) -> Option<LowStockAlert> {
    if !is_low(balance, product.min_stock) {
        return None;
    }
    Some(LowStockAlert {
        product_id: product.id,
        warehouse_id,
        current_stock: balance,
        min_stock: product.min_stock,
        recipient: product.created_by,
        message: low_stock_message(&product.name, warehouse_name, balance),
    })
}

/// Text of the low-stock notification.
pub fn low_stock_message(product_name: &str, warehouse_name: &str, balance: u64) -> String {
    format!("Low stock for {product_name} in {warehouse_name}. Current quantity: {balance}")
}

/// One row of the low-stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product_id: ProductId,
    pub name: String,
    pub sku: Sku,
    pub warehouse_id: WarehouseId,
    pub current_stock: u64,
    pub min_stock: u64,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowStockScan {
    pub items: Vec<LowStockItem>,
    /// Products whose primary warehouse no longer resolves.
    pub skipped: Vec<ProductId>,
}

/// Bulk scan over `products`, each evaluated at its primary warehouse.
///
/// `warehouse_exists` and `balance_of` are lookups into whatever store the
/// caller holds; the scan itself never touches storage.
pub fn scan<'a, I, E, B>(products: I, warehouse_filter: Option<WarehouseId>, warehouse_exists: E, balance_of: B) -> LowStockScan
where
    I: IntoIterator<Item = &'a Product>,
    E: Fn(WarehouseId) -> bool,
    B: Fn(ProductId, WarehouseId) -> u64,
{
    let mut out = LowStockScan::default();
    for product in products {
        if warehouse_filter.is_some_and(|w| w != product.warehouse_id) {
            continue;
        }
        if !warehouse_exists(product.warehouse_id) {
            out.skipped.push(product.id);
            continue;
        }
        let current = balance_of(product.id, product.warehouse_id);
        if is_low(current, product.min_stock) {
            out.items.push(LowStockItem {
                product_id: product.id,
                name: product.name.clone(),
                sku: product.sku.clone(),
                warehouse_id: product.warehouse_id,
                current_stock: current,
                min_stock: product.min_stock,
                created_by: product.created_by,
            });
        }
    }
    out
}
