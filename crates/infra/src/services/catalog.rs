//! Catalog management: warehouses, categories, products.

use chrono::Utc;
use tracing::{info, instrument};

use depot_auth::{Action, Principal};
use depot_catalog::{
    Category, CategoryUpdate, NewCategory, NewProduct, NewWarehouse, Product, ProductUpdate, Warehouse,
    WarehouseUpdate, would_create_cycle,
};
use depot_core::{CategoryId, DomainError, DomainResult, ProductId, WarehouseId};

use crate::audit::NewAuditEntry;
use crate::cache::CacheScope;
use crate::config::WarehouseDeletePolicy;
use crate::effects::SideEffects;
use crate::notifications::NotificationCategory;

use super::Depot;

/// Deepest category chain walked by the cycle check.
const MAX_CATEGORY_DEPTH: usize = 64;

/// Optional product listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub category_id: Option<CategoryId>,
}

impl Depot {
    // --- warehouses -------------------------------------------------------

    #[instrument(skip(self, principal, input), fields(user = %principal.username), err)]
    pub fn create_warehouse(&self, principal: &Principal, input: NewWarehouse) -> DomainResult<Warehouse> {
        self.guard(principal, Action::CreateWarehouse)?;
        let warehouse = input.into_warehouse(principal.user_id, Utc::now())?;
        let warehouse = self.warehouses.insert_with(warehouse, |w, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_warehouse",
                w,
                format!("Created warehouse {} ({})", w.name, w.kind.as_str()),
            ))
        })?;
        info!(warehouse_id = %warehouse.id, name = %warehouse.name, "warehouse created");
        self.signal(CacheScope::WarehouseList);
        Ok(warehouse)
    }

    #[instrument(skip(self, principal, update), fields(user = %principal.username), err)]
    pub fn update_warehouse(
        &self,
        principal: &Principal,
        warehouse_id: WarehouseId,
        update: WarehouseUpdate,
    ) -> DomainResult<Warehouse> {
        self.guard(principal, Action::UpdateWarehouse)?;
        let warehouse = self.warehouses.update(warehouse_id, |w, _| {
            w.apply(update, Utc::now())?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_warehouse",
                w,
                format!("Updated warehouse {}", w.name),
            ))
        })?;
        self.signal(CacheScope::WarehouseList);
        Ok(warehouse)
    }

    /// Delete a warehouse according to the configured [`WarehouseDeletePolicy`].
    ///
    /// `Restrict` refuses while products reference the warehouse or stock is
    /// held there. `Cascade` also removes the contained products, their
    /// orders, and every balance row of those products or of this warehouse.
    /// Inventory counts taken in the warehouse are dropped; ledger history is
    /// kept either way.
    #[instrument(skip(self, principal), fields(user = %principal.username, policy = ?self.settings.warehouse_delete), err)]
    pub fn delete_warehouse(&self, principal: &Principal, warehouse_id: WarehouseId) -> DomainResult<Warehouse> {
        self.guard(principal, Action::DeleteWarehouse)?;
        // Exclusive: no product can be placed here and no balance row can
        // appear while the delete runs.
        let gate = self.catalog_exclusive()?;
        self.warehouses.require(warehouse_id)?;
        let contained: Vec<ProductId> = self
            .products
            .filter(|p| p.warehouse_id == warehouse_id)?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let cascade = match self.settings.warehouse_delete {
            WarehouseDeletePolicy::Restrict if !contained.is_empty() => {
                return Err(DomainError::conflict(format!(
                    "warehouse still holds {} product(s)",
                    contained.len()
                )));
            }
            WarehouseDeletePolicy::Restrict => false,
            WarehouseDeletePolicy::Cascade => true,
        };

        let (warehouse, removed_products) = self.balances.retire_with(
            |key| key.warehouse_id == warehouse_id || contained.contains(&key.product_id),
            !cascade,
            |dropped| {
                let warehouse = self.warehouses.remove_with(warehouse_id, |w, _| {
                    self.record(NewAuditEntry::for_entity(
                        Some(principal.user_id),
                        "delete_warehouse",
                        w,
                        format!(
                            "Deleted warehouse {} with {} product(s) and {} stocked balance(s)",
                            w.name,
                            contained.len(),
                            dropped.len()
                        ),
                    ))
                })?;
                // Past the audit gate only a poisoned lock can fail.
                let removed = self.products.remove_where(|p| contained.contains(&p.id))?;
                self.orders.remove_where(|o| contained.contains(&o.product_id()))?;
                self.counts
                    .remove_where(|c| c.warehouse_id() == warehouse_id || contained.contains(&c.product_id()))?;
                Ok((warehouse, removed.len()))
            },
        )?;
        drop(gate);

        info!(warehouse_id = %warehouse.id, removed_products, "warehouse deleted");
        let mut fx = SideEffects::new();
        fx.invalidate(CacheScope::WarehouseList);
        if removed_products > 0 {
            fx.invalidate(CacheScope::StockBalance);
        }
        self.finish(fx);
        Ok(warehouse)
    }

    pub fn warehouse(&self, principal: &Principal, warehouse_id: WarehouseId) -> DomainResult<Warehouse> {
        self.guard(principal, Action::ViewCatalog)?;
        self.warehouses.require(warehouse_id)
    }

    pub fn warehouses(&self, principal: &Principal) -> DomainResult<Vec<Warehouse>> {
        self.guard(principal, Action::ViewCatalog)?;
        let mut all = self.warehouses.list()?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    // --- categories -------------------------------------------------------

    #[instrument(skip(self, principal, input), fields(user = %principal.username), err)]
    pub fn create_category(&self, principal: &Principal, input: NewCategory) -> DomainResult<Category> {
        self.guard(principal, Action::CreateCategory)?;
        let category = input.into_category(principal.user_id, Utc::now())?;
        let category = self.categories.insert_with(category, |c, all| {
            if let Some(parent) = c.parent_id {
                if !all.contains_key(&parent) {
                    return Err(DomainError::NotFound("Category"));
                }
            }
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_category",
                c,
                format!("Created category {}", c.name),
            ))
        })?;
        self.signal(CacheScope::CategoryList);
        Ok(category)
    }

    #[instrument(skip(self, principal, update), fields(user = %principal.username), err)]
    pub fn update_category(
        &self,
        principal: &Principal,
        category_id: CategoryId,
        update: CategoryUpdate,
    ) -> DomainResult<Category> {
        self.guard(principal, Action::UpdateCategory)?;
        let category = self.categories.update(category_id, |c, all| {
            if let Some(Some(parent)) = update.parent_id {
                if !all.contains_key(&parent) {
                    return Err(DomainError::NotFound("Category"));
                }
                if would_create_cycle(c.id, parent, MAX_CATEGORY_DEPTH, |id| {
                    all.get(&id).and_then(|x| x.parent_id)
                }) {
                    return Err(DomainError::validation("category parent would create a cycle"));
                }
            }
            c.apply(update, Utc::now())?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_category",
                c,
                format!("Updated category {}", c.name),
            ))
        })?;
        self.signal(CacheScope::CategoryList);
        Ok(category)
    }

    /// Delete a category; children become roots and products lose the category.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn delete_category(&self, principal: &Principal, category_id: CategoryId) -> DomainResult<Category> {
        self.guard(principal, Action::DeleteCategory)?;
        let category = self.categories.remove_with(category_id, |c, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "delete_category",
                c,
                format!("Deleted category {}", c.name),
            ))
        })?;
        let now = Utc::now();
        let children = self.categories.update_where(
            |c| c.parent_id == Some(category_id),
            |c| {
                c.parent_id = None;
                c.updated_at = now;
            },
        )?;
        let products = self.products.update_where(
            |p| p.category_id == Some(category_id),
            |p| {
                p.category_id = None;
                p.updated_at = now;
            },
        )?;
        info!(category_id = %category.id, children, products, "category deleted");
        self.signal(CacheScope::CategoryList);
        Ok(category)
    }

    pub fn category(&self, principal: &Principal, category_id: CategoryId) -> DomainResult<Category> {
        self.guard(principal, Action::ViewCatalog)?;
        self.categories.require(category_id)
    }

    pub fn categories(&self, principal: &Principal) -> DomainResult<Vec<Category>> {
        self.guard(principal, Action::ViewCatalog)?;
        let mut all = self.categories.list()?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    // --- products ---------------------------------------------------------

    #[instrument(skip(self, principal, input), fields(user = %principal.username, sku = %input.sku), err)]
    pub fn create_product(&self, principal: &Principal, input: NewProduct) -> DomainResult<Product> {
        self.guard(principal, Action::CreateProduct)?;
        let product = input.into_product(principal.user_id, Utc::now())?;

        let gate = self.catalog_shared()?;
        let product = self.products.insert_with(product, |p, all| {
            self.require_placement(p)?;
            if all.values().any(|other| other.sku == p.sku) {
                return Err(DomainError::conflict(format!("sku {} already exists", p.sku)));
            }
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_product",
                p,
                format!("Created product {} (SKU: {})", p.name, p.sku),
            ))
        })?;
        drop(gate);
        info!(product_id = %product.id, sku = %product.sku, "product created");

        let mut fx = SideEffects::new();
        fx.notify(
            principal.user_id,
            format!("Product {} added successfully", product.name),
            NotificationCategory::General,
        );
        self.finish(fx);
        Ok(product)
    }

    #[instrument(skip(self, principal, update), fields(user = %principal.username), err)]
    pub fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> DomainResult<Product> {
        self.guard(principal, Action::UpdateProduct)?;
        let _gate = self.catalog_shared()?;
        self.products.update(product_id, |p, _| {
            p.apply(update, Utc::now())?;
            self.require_placement(p)?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_product",
                p,
                format!("Updated product {} (SKU: {})", p.name, p.sku),
            ))
        })
    }

    /// Delete a product that holds no stock anywhere. Its empty balance rows,
    /// orders and inventory counts go with it; its ledger history stays.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn delete_product(&self, principal: &Principal, product_id: ProductId) -> DomainResult<Product> {
        self.guard(principal, Action::DeleteProduct)?;
        let gate = self.catalog_exclusive()?;
        self.products.require(product_id)?;
        let product = self.balances.retire_with(
            |key| key.product_id == product_id,
            true,
            |_| {
                let product = self.products.remove_with(product_id, |p, _| {
                    self.record(NewAuditEntry::for_entity(
                        Some(principal.user_id),
                        "delete_product",
                        p,
                        format!("Deleted product {} (SKU: {})", p.name, p.sku),
                    ))
                })?;
                self.orders.remove_where(|o| o.product_id() == product_id)?;
                self.counts.remove_where(|c| c.product_id() == product_id)?;
                Ok(product)
            },
        )?;
        drop(gate);
        info!(product_id = %product.id, "product deleted");
        self.signal(CacheScope::StockBalance);
        Ok(product)
    }

    pub fn product(&self, principal: &Principal, product_id: ProductId) -> DomainResult<Product> {
        self.guard(principal, Action::ViewCatalog)?;
        self.products.require(product_id)
    }

    pub fn products(&self, principal: &Principal, filter: ProductFilter) -> DomainResult<Vec<Product>> {
        self.guard(principal, Action::ViewCatalog)?;
        let mut found = self.products.filter(|p| {
            filter.warehouse_id.is_none_or(|w| p.warehouse_id == w)
                && filter.category_id.is_none_or(|c| p.category_id == Some(c))
        })?;
        found.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(found)
    }

    /// The product's warehouse and category must exist. Runs inside the
    /// products write lock so the check and the write are one step.
    fn require_placement(&self, product: &Product) -> DomainResult<()> {
        self.warehouses.require(product.warehouse_id)?;
        if let Some(category_id) = product.category_id {
            self.categories.require(category_id)?;
        }
        Ok(())
    }

    fn signal(&self, scope: CacheScope) {
        let mut fx = SideEffects::new();
        fx.invalidate(scope);
        self.finish(fx);
    }
}
