use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{
    CategoryId, DomainError, Entity, ProductId, Timestamped, UserId, ValueObject, WarehouseId,
};

const SKU_MAX_LEN: usize = 50;
const UNIT_MAX_LEN: usize = 20;
const NAME_MAX_LEN: usize = 100;

/// Stock keeping unit. Trimmed, non-empty, at most 50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let sku = raw.trim();
        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if sku.chars().count() > SKU_MAX_LEN {
            return Err(DomainError::validation(format!(
                "sku exceeds {SKU_MAX_LEN} characters"
            )));
        }
        if sku.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("sku cannot contain whitespace"));
        }
        Ok(Self(sku.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Sku::parse(&value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stocked product.
///
/// `warehouse_id` is the product's primary warehouse: the one the low-stock
/// scan evaluates. Stock may still be held in other warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: Sku,
    pub unit: String,
    pub description: String,
    pub min_stock: u64,
    pub warehouse_id: WarehouseId,
    pub category_id: Option<CategoryId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;
    const MODEL_NAME: &'static str = "Product";

    fn id(&self) -> ProductId {
        self.id
    }
}

impl Timestamped for Product {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_stock: u64,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl NewProduct {
    pub fn into_product(self, created_by: UserId, now: DateTime<Utc>) -> Result<Product, DomainError> {
        Ok(Product {
            id: ProductId::new(),
            name: clean_name(&self.name)?,
            sku: Sku::parse(&self.sku)?,
            unit: clean_unit(&self.unit)?,
            description: self.description.trim().to_string(),
            min_stock: self.min_stock,
            warehouse_id: self.warehouse_id,
            category_id: self.category_id,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial product update. `None` leaves a field untouched.
///
/// `sku` is accepted only so that callers echoing the full record back do not
/// fail; any value other than the current SKU is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub min_stock: Option<u64>,
    pub warehouse_id: Option<WarehouseId>,
    /// `Some(None)` detaches the product from its category.
    pub category_id: Option<Option<CategoryId>>,
}

impl Product {
    pub fn apply(&mut self, update: ProductUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(sku) = update.sku.as_deref() {
            if Sku::parse(sku)? != self.sku {
                return Err(DomainError::validation("sku is immutable after creation"));
            }
        }
        let name = update.name.as_deref().map(clean_name).transpose()?;
        let unit = update.unit.as_deref().map(clean_unit).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(unit) = unit {
            self.unit = unit;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(min_stock) = update.min_stock {
            self.min_stock = min_stock;
        }
        if let Some(warehouse_id) = update.warehouse_id {
            self.warehouse_id = warehouse_id;
        }
        if let Some(category_id) = update.category_id {
            self.category_id = category_id;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn clean_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("product name cannot be empty"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "product name exceeds {NAME_MAX_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn clean_unit(unit: &str) -> Result<String, DomainError> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(DomainError::validation("unit cannot be empty"));
    }
    if unit.chars().count() > UNIT_MAX_LEN {
        return Err(DomainError::validation(format!(
            "unit exceeds {UNIT_MAX_LEN} characters"
        )));
    }
    Ok(unit.to_string())
}
