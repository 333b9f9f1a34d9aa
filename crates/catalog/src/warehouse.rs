use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, Entity, Timestamped, UserId, WarehouseId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseType {
    #[default]
    Retail,
    Distribution,
    Storage,
}

impl WarehouseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseType::Retail => "retail",
            WarehouseType::Distribution => "distribution",
            WarehouseType::Storage => "storage",
        }
    }
}

impl FromStr for WarehouseType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retail" => Ok(WarehouseType::Retail),
            "distribution" => Ok(WarehouseType::Distribution),
            "storage" => Ok(WarehouseType::Storage),
            _ => Err(DomainError::validation(
                "warehouse type must be one of: retail, distribution, storage",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub kind: WarehouseType,
    pub location: String,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Warehouse {
    type Id = WarehouseId;
    const MODEL_NAME: &'static str = "Warehouse";

    fn id(&self) -> WarehouseId {
        self.id
    }
}

impl Timestamped for Warehouse {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    #[serde(default)]
    pub kind: WarehouseType,
    pub location: String,
}

impl NewWarehouse {
    pub fn into_warehouse(self, created_by: UserId, now: DateTime<Utc>) -> Result<Warehouse, DomainError> {
        Ok(Warehouse {
            id: WarehouseId::new(),
            name: clean_name(&self.name)?,
            kind: self.kind,
            location: clean_location(&self.location)?,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseUpdate {
    pub name: Option<String>,
    pub kind: Option<WarehouseType>,
    pub location: Option<String>,
}

impl Warehouse {
    pub fn apply(&mut self, update: WarehouseUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        // Validate everything before touching `self`.
        let name = update.name.as_deref().map(clean_name).transpose()?;
        let location = update.location.as_deref().map(clean_location).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(location) = location {
            self.location = location;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn clean_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("warehouse name cannot be empty"));
    }
    if name.chars().count() > 100 {
        return Err(DomainError::validation("warehouse name exceeds 100 characters"));
    }
    Ok(name.to_string())
}

fn clean_location(location: &str) -> Result<String, DomainError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(DomainError::validation("warehouse location cannot be empty"));
    }
    if location.chars().count() > 200 {
        return Err(DomainError::validation("warehouse location exceeds 200 characters"));
    }
    Ok(location.to_string())
}
