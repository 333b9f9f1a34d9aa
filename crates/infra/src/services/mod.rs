//! Application services: the `Depot` facade.
//!
//! Every public operation starts with [`Depot::guard`] (one policy table, no
//! ad-hoc role checks), then runs pure domain rules against the stores, writes
//! its audit entry as the last fallible step before commit, and hands side
//! effects to [`SideEffects::dispatch`] once committed.
//!
//! Lock order, outermost first: catalog gate → balance rows → entity tables →
//! audit trail → journal. Nothing acquires a balance row while holding a
//! table lock.
//!
//! The catalog gate is shared by every operation that writes a balance row or
//! a record pointing at a product or warehouse, and exclusive for product and
//! warehouse deletes. A delete therefore sees a settled set of balance rows
//! and dependants, and nothing can reference the record once it is gone.

pub mod catalog;
pub mod counts;
pub mod inbox;
pub mod orders;
pub mod reports;
pub mod stock;
pub mod users;

pub use reports::AnalyticsSummary;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::warn;

use depot_auth::{Action, Principal, Role, User, authorize};
use depot_catalog::{Category, Product, Warehouse};
use depot_core::{DomainError, DomainResult};
use depot_inventory::InventoryCount;
use depot_orders::Order;

use crate::audit::{AuditTrail, InMemoryAuditTrail, NewAuditEntry};
use crate::cache::{CacheInvalidator, NoopCache};
use crate::config::DepotSettings;
use crate::effects::SideEffects;
use crate::notifications::{InMemoryNotificationStore, Notifier};
use crate::store::{BalanceStore, EntityTable, Journal};

pub struct Depot {
    pub(crate) products: EntityTable<Product>,
    pub(crate) warehouses: EntityTable<Warehouse>,
    pub(crate) categories: EntityTable<Category>,
    pub(crate) orders: EntityTable<Order>,
    pub(crate) counts: EntityTable<InventoryCount>,
    pub(crate) users: EntityTable<User>,
    pub(crate) balances: BalanceStore,
    pub(crate) journal: Journal,
    pub(crate) audit: Arc<dyn AuditTrail>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) cache: Arc<dyn CacheInvalidator>,
    pub(crate) settings: DepotSettings,
    catalog_gate: RwLock<()>,
}

impl Default for Depot {
    fn default() -> Self {
        Self::new(DepotSettings::default())
    }
}

impl Depot {
    /// In-memory stores and collaborators.
    pub fn new(settings: DepotSettings) -> Self {
        Self {
            products: EntityTable::new(),
            warehouses: EntityTable::new(),
            categories: EntityTable::new(),
            orders: EntityTable::new(),
            counts: EntityTable::new(),
            users: EntityTable::new(),
            balances: BalanceStore::new(),
            journal: Journal::new(),
            audit: Arc::new(InMemoryAuditTrail::new()),
            notifier: Arc::new(InMemoryNotificationStore::new()),
            cache: Arc::new(NoopCache),
            settings,
            catalog_gate: RwLock::new(()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditTrail>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    pub fn settings(&self) -> DepotSettings {
        self.settings
    }

    /// Create the first administrator. Unguarded: this is how a fresh
    /// deployment gets a principal that can call everything else.
    pub fn bootstrap_admin(&self, username: &str, email: &str) -> DomainResult<User> {
        let mut user = depot_auth::NewUser {
            username: username.to_string(),
            email: email.to_string(),
            role: Some(Role::Admin),
        }
        .into_user(Utc::now())?;
        user.is_superuser = true;

        let user = self.users.insert_with(user, |u, all| {
            users::ensure_unique_username(u, all)?;
            self.record(NewAuditEntry::for_entity(None, "create_user", u, format!("Bootstrapped admin {}", u.username)))
        })?;
        tracing::info!(user = %user.username, "bootstrap admin created");
        Ok(user)
    }

    /// The single access check every operation goes through.
    pub(crate) fn guard(&self, principal: &Principal, action: Action) -> DomainResult<()> {
        authorize(Some(principal), action).map_err(|err| {
            warn!(
                user = %principal.username,
                action = action.as_str(),
                error = %err,
                "permission denied"
            );
            DomainError::from(err)
        })
    }

    pub(crate) fn catalog_shared(&self) -> DomainResult<RwLockReadGuard<'_, ()>> {
        self.catalog_gate.read().map_err(|_| DomainError::poisoned("catalog gate"))
    }

    pub(crate) fn catalog_exclusive(&self) -> DomainResult<RwLockWriteGuard<'_, ()>> {
        self.catalog_gate.write().map_err(|_| DomainError::poisoned("catalog gate"))
    }

    pub(crate) fn record(&self, entry: NewAuditEntry) -> DomainResult<()> {
        self.audit.record(entry)?;
        Ok(())
    }

    pub(crate) fn finish(&self, effects: SideEffects) {
        effects.dispatch(self.notifier.as_ref(), self.cache.as_ref());
    }
}
