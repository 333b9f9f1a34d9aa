//! Configuration loading and representation.
//!
//! Everything is read from environment variables. `from_lookup` takes any
//! key lookup so tests never have to touch the process environment.

use depot_observability::{LogFormat, TracingConfig};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// What happens to contained products when a warehouse is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarehouseDeletePolicy {
    /// Refuse while any product still references the warehouse.
    #[default]
    Restrict,
    /// Remove contained products and their balances with the warehouse.
    Cascade,
}

impl core::str::FromStr for WarehouseDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(WarehouseDeletePolicy::Restrict),
            "cascade" => Ok(WarehouseDeletePolicy::Cascade),
            _ => Err("expected `restrict` or `cascade`".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Behaviour switches for the application services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepotSettings {
    pub low_stock_notify: bool,
    pub warehouse_delete: WarehouseDeletePolicy,
}

impl Default for DepotSettings {
    fn default() -> Self {
        Self {
            low_stock_notify: true,
            warehouse_delete: WarehouseDeletePolicy::Restrict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotConfig {
    /// `None` when `DATABASE_URL` is unset; the in-memory stores are used.
    pub database: Option<DatabaseConfig>,
    pub tracing: TracingConfig,
    pub settings: DepotSettings,
}

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

impl DepotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_connections = match get("DEPOT_DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("DEPOT_DB_MAX_CONNECTIONS", raw, "expected a positive integer")),
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let database = get("DATABASE_URL").map(|url| DatabaseConfig { url, max_connections });

        let format = match get("DEPOT_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| invalid("DEPOT_LOG_FORMAT", raw, &e.to_string()))?,
            None => LogFormat::default(),
        };
        let tracing = TracingConfig { filter: get("RUST_LOG"), format };

        let low_stock_notify = match get("DEPOT_LOW_STOCK_NOTIFY") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| invalid("DEPOT_LOW_STOCK_NOTIFY", raw, "expected true/false"))?,
            None => true,
        };
        let warehouse_delete = match get("DEPOT_WAREHOUSE_DELETE") {
            Some(raw) => raw
                .parse::<WarehouseDeletePolicy>()
                .map_err(|reason| invalid("DEPOT_WAREHOUSE_DELETE", raw, &reason))?,
            None => WarehouseDeletePolicy::default(),
        };

        Ok(Self {
            database,
            tracing,
            settings: DepotSettings { low_stock_notify, warehouse_delete },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &'static str, value: String, reason: &str) -> ConfigError {
    ConfigError::Invalid { key, value, reason: reason.to_string() }
}
