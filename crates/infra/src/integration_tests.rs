//! End-to-end tests over the `Depot` facade.
//!
//! Verifies:
//! - Stock operations commit balance, ledger and audit together or not at all
//! - Concurrent outcomes and crossing transfers never overdraw or deadlock
//! - Access checks run before anything else
//! - Side-effect failures never undo a committed operation

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;

    use depot_auth::{NewUser, Principal, Role};
    use depot_catalog::{NewProduct, NewWarehouse, ProductUpdate, WarehouseType};
    use depot_core::{DomainError, ErrorKind, NotificationId, ProductId, UserId, WarehouseId};
    use depot_inventory::{BalanceKey, MAX_QUANTITY, MovementKind, MovementRequest, NewInventoryCount, TransferRequest};
    use depot_orders::{NewOrder, OrderStatus, OrderType};

    use crate::audit::{AuditEntry, AuditError, AuditFilter, AuditTrail, InMemoryAuditTrail, NewAuditEntry};
    use crate::cache::{CacheScope, RecordingCache};
    use crate::config::{DepotSettings, WarehouseDeletePolicy};
    use crate::notifications::{InMemoryNotificationStore, Notification, NotificationCategory, Notifier, NotifyError};
    use crate::services::Depot;
    use crate::services::catalog::ProductFilter;

    /// Audit trail that can be switched into failure mid-test, or made to
    /// hold one entry until released.
    #[derive(Default)]
    struct SwitchableAudit {
        inner: InMemoryAuditTrail,
        failing: AtomicBool,
        held: Mutex<Option<Hold>>,
    }

    struct Hold {
        action: &'static str,
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl SwitchableAudit {
        fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        /// The next `action` entry blocks inside `record` until the returned
        /// sender fires. The receiver reports that the writer got there.
        fn hold_next(&self, action: &'static str) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.held.lock().unwrap() = Some(Hold {
                action,
                entered: entered_tx,
                release: release_rx,
            });
            (entered_rx, release_tx)
        }
    }

    impl AuditTrail for SwitchableAudit {
        fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditError> {
            let hold = {
                let mut held = self.held.lock().unwrap();
                if held.as_ref().is_some_and(|h| h.action == entry.action) {
                    held.take()
                } else {
                    None
                }
            };
            if let Some(hold) = hold {
                hold.entered.send(()).unwrap();
                hold.release.recv().unwrap();
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(AuditError::Unavailable("disk full".to_string()));
            }
            self.inner.record(entry)
        }

        fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
            self.inner.list(filter)
        }
    }

    struct DeadNotifier;

    impl Notifier for DeadNotifier {
        fn notify(&self, _: UserId, _: &str, _: NotificationCategory) -> Result<Notification, NotifyError> {
            Err(NotifyError::Delivery("connection refused".to_string()))
        }
        fn inbox(&self, _: UserId) -> Result<Vec<Notification>, NotifyError> {
            Ok(vec![])
        }
        fn get(&self, _: NotificationId) -> Result<Option<Notification>, NotifyError> {
            Ok(None)
        }
        fn mark_read(&self, _: NotificationId) -> Result<Option<Notification>, NotifyError> {
            Ok(None)
        }
    }

    struct Fixture {
        depot: Depot,
        inbox: Arc<InMemoryNotificationStore>,
        audit: Arc<SwitchableAudit>,
        admin: Principal,
    }

    fn fixture_with(settings: DepotSettings) -> Fixture {
        let inbox = Arc::new(InMemoryNotificationStore::new());
        let audit = Arc::new(SwitchableAudit::default());
        let depot = Depot::new(settings).with_notifier(inbox.clone()).with_audit(audit.clone());
        let admin = depot.bootstrap_admin("admin", "admin@example.com").unwrap().principal();
        Fixture {
            depot,
            inbox,
            audit,
            admin,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(DepotSettings::default())
    }

    impl Fixture {
        fn warehouse(&self, name: &str) -> WarehouseId {
            self.depot
                .create_warehouse(
                    &self.admin,
                    NewWarehouse {
                        name: name.to_string(),
                        kind: WarehouseType::Storage,
                        location: "Dock 1".to_string(),
                    },
                )
                .unwrap()
                .id
        }

        fn product(&self, sku: &str, warehouse_id: WarehouseId, min_stock: u64) -> ProductId {
            self.depot
                .create_product(
                    &self.admin,
                    NewProduct {
                        name: format!("Product {sku}"),
                        sku: sku.to_string(),
                        unit: "pcs".to_string(),
                        description: String::new(),
                        min_stock,
                        warehouse_id,
                        category_id: None,
                    },
                )
                .unwrap()
                .id
        }

        fn user(&self, username: &str, role: Role) -> Principal {
            self.depot
                .create_user(
                    &self.admin,
                    NewUser {
                        username: username.to_string(),
                        email: format!("{username}@example.com"),
                        role: Some(role),
                    },
                )
                .unwrap()
                .principal()
        }

        fn balance(&self, product_id: ProductId, warehouse_id: WarehouseId) -> u64 {
            self.depot.balance(&self.admin, product_id, warehouse_id).unwrap()
        }

        fn audit_count(&self) -> usize {
            self.audit.list(&AuditFilter::default()).unwrap().len()
        }

        fn inbox_of(&self, user: UserId, category: NotificationCategory) -> Vec<Notification> {
            self.inbox
                .inbox(user)
                .unwrap()
                .into_iter()
                .filter(|n| n.category == category)
                .collect()
        }
    }

    fn movement(product_id: ProductId, warehouse_id: WarehouseId, kind: MovementKind, quantity: u64) -> MovementRequest {
        MovementRequest {
            product_id,
            warehouse_id,
            kind,
            quantity,
        }
    }

    fn transfer(product_id: ProductId, from: WarehouseId, to: WarehouseId, quantity: u64) -> TransferRequest {
        TransferRequest {
            product_id,
            from_warehouse_id: from,
            to_warehouse_id: to,
            quantity,
        }
    }

    #[test]
    fn income_then_overdraw_is_rejected_and_leaves_balance() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);

        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 20)).unwrap();
        assert_eq!(fx.balance(p1, w1), 20);

        let err = fx
            .depot
            .perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 25))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 25,
                available: 20
            }
        );
        assert_eq!(fx.balance(p1, w1), 20);
        assert_eq!(fx.depot.movement_history(&fx.admin, p1, None).unwrap().len(), 1);
    }

    #[test]
    fn transfer_moves_stock_and_tags_both_legs() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 20)).unwrap();

        let t = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 15)).unwrap();
        assert_eq!(fx.balance(p1, w1), 5);
        assert_eq!(fx.balance(p1, w2), 15);

        let legs: Vec<_> = fx
            .depot
            .movement_history(&fx.admin, p1, None)
            .unwrap()
            .into_iter()
            .filter(|m| m.transfer_id == Some(t.id))
            .collect();
        assert_eq!(legs.len(), 2);
        assert_eq!(fx.depot.ledger_net(&fx.admin, p1, w1).unwrap(), 5);
        assert_eq!(fx.depot.ledger_net(&fx.admin, p1, w2).unwrap(), 15);
        assert_eq!(fx.depot.transfer(&fx.admin, t.id).unwrap(), t);
    }

    #[test]
    fn same_warehouse_transfer_is_invalid() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 5)).unwrap();

        let err = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w1, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fx.balance(p1, w1), 5);
    }

    #[test]
    fn outcome_to_threshold_notifies_product_creator() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 10);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 12)).unwrap();
        assert!(fx.inbox_of(fx.admin.user_id, NotificationCategory::LowStock).is_empty());

        let clerk = fx.user("clerk", Role::Clerk);
        fx.depot.perform_movement(&clerk, movement(p1, w1, MovementKind::Out, 5)).unwrap();
        assert_eq!(fx.balance(p1, w1), 7);

        let alerts = fx.inbox_of(fx.admin.user_id, NotificationCategory::LowStock);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("Current quantity: 7"));
        assert!(fx.inbox_of(clerk.user_id, NotificationCategory::LowStock).is_empty());

        let low = fx.depot.list_low_stock(&clerk, Some(w1)).unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].current_stock, 7);
    }

    #[test]
    fn low_stock_notifications_can_be_disabled() {
        let fx = fixture_with(DepotSettings {
            low_stock_notify: false,
            ..DepotSettings::default()
        });
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 10);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 3)).unwrap();
        assert!(fx.inbox_of(fx.admin.user_id, NotificationCategory::LowStock).is_empty());
        assert_eq!(fx.depot.list_low_stock(&fx.admin, None).unwrap().len(), 1);
    }

    #[test]
    fn clerk_cannot_delete_a_warehouse() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let clerk = fx.user("clerk", Role::Clerk);
        let before = fx.audit_count();

        let err = fx.depot.delete_warehouse(&clerk, w1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(fx.depot.warehouse(&fx.admin, w1).is_ok());
        assert_eq!(fx.audit_count(), before);
    }

    #[test]
    fn analyst_reads_analytics_but_cannot_move_stock() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 5);
        let analyst = fx.user("analyst", Role::Analyst);

        let summary = fx.depot.analytics(&analyst).unwrap();
        assert_eq!(summary.total_products, 1);
        assert_eq!(summary.total_warehouses, 1);
        assert_eq!(summary.low_stock_count, 1);

        let err = fx
            .depot
            .perform_movement(&analyst, movement(p1, w1, MovementKind::In, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(fx.balance(p1, w1), 0);
    }

    #[test]
    fn concurrent_outcomes_never_overdraw() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 100)).unwrap();

        let succeeded: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(|| {
                        fx.depot
                            .perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 7))
                            .is_ok() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(succeeded, 100 / 7);
        assert_eq!(fx.balance(p1, w1), 100 - 7 * (100 / 7));
        assert_eq!(fx.depot.ledger_net(&fx.admin, p1, w1).unwrap(), fx.balance(p1, w1) as i128);
    }

    #[test]
    fn crossing_transfers_do_not_deadlock() {
        let fx = fixture();
        let (a, b) = (fx.warehouse("A"), fx.warehouse("B"));
        let p1 = fx.product("P1", a, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, a, MovementKind::In, 500)).unwrap();
        fx.depot.perform_movement(&fx.admin, movement(p1, b, MovementKind::In, 500)).unwrap();

        thread::scope(|s| {
            for (from, to) in [(a, b), (b, a), (a, b), (b, a)] {
                let fx = &fx;
                s.spawn(move || {
                    for _ in 0..100 {
                        fx.depot.perform_transfer(&fx.admin, transfer(p1, from, to, 1)).unwrap();
                    }
                });
            }
        });

        assert_eq!(fx.balance(p1, a) + fx.balance(p1, b), 1000);
        assert_eq!(fx.balance(p1, a), 500);
        assert_eq!(fx.depot.transfers(&fx.admin).unwrap().len(), 400);
    }

    #[test]
    fn audit_failure_rolls_back_the_whole_operation() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 10)).unwrap();
        fx.audit.fail();

        let err = fx
            .depot
            .perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 5))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(fx.balance(p1, w1), 10);
        assert_eq!(fx.balance(p1, w2), 0);
        assert_eq!(fx.depot.movement_history(&fx.admin, p1, None).unwrap().len(), 1);
        assert!(fx.depot.transfers(&fx.admin).unwrap().is_empty());
    }

    #[test]
    fn destination_overflow_leaves_source_untouched() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 10)).unwrap();
        fx.depot
            .perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, MAX_QUANTITY))
            .unwrap();

        let err = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(fx.balance(p1, w1), 10);
        assert_eq!(fx.balance(p1, w2), MAX_QUANTITY);
    }

    #[test]
    fn dead_notifier_does_not_undo_a_commit() {
        let settings = DepotSettings::default();
        let depot = Depot::new(settings).with_notifier(Arc::new(DeadNotifier));
        let admin = depot.bootstrap_admin("admin", "admin@example.com").unwrap().principal();
        let w1 = depot
            .create_warehouse(
                &admin,
                NewWarehouse {
                    name: "W1".to_string(),
                    kind: WarehouseType::Retail,
                    location: "Dock 1".to_string(),
                },
            )
            .unwrap()
            .id;
        let p1 = depot
            .create_product(
                &admin,
                NewProduct {
                    name: "P1".to_string(),
                    sku: "P1".to_string(),
                    unit: "pcs".to_string(),
                    description: String::new(),
                    min_stock: 50,
                    warehouse_id: w1,
                    category_id: None,
                },
            )
            .unwrap()
            .id;

        depot.perform_movement(&admin, movement(p1, w1, MovementKind::In, 3)).unwrap();
        assert_eq!(depot.balance(&admin, p1, w1).unwrap(), 3);
    }

    #[test]
    fn stock_changes_signal_cache_invalidation() {
        let cache = Arc::new(RecordingCache::new());
        let depot = Depot::default().with_cache(cache.clone());
        let admin = depot.bootstrap_admin("admin", "admin@example.com").unwrap().principal();
        depot
            .create_warehouse(
                &admin,
                NewWarehouse {
                    name: "W1".to_string(),
                    kind: WarehouseType::Retail,
                    location: "Dock 1".to_string(),
                },
            )
            .unwrap();
        assert_eq!(cache.signals(), vec![CacheScope::WarehouseList]);
    }

    #[test]
    fn a_transfer_is_reversible_once() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 20)).unwrap();
        let t = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 15)).unwrap();

        let reversal = fx.depot.reverse_transfer(&fx.admin, t.id).unwrap();
        assert_eq!(reversal.reverses, Some(t.id));
        assert_eq!(fx.balance(p1, w1), 20);
        assert_eq!(fx.balance(p1, w2), 0);

        let again = fx.depot.reverse_transfer(&fx.admin, t.id).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Conflict);
        let nested = fx.depot.reverse_transfer(&fx.admin, reversal.id).unwrap_err();
        assert_eq!(nested.kind(), ErrorKind::Conflict);
        assert_eq!(fx.depot.transfers(&fx.admin).unwrap().len(), 2);
    }

    #[test]
    fn reversal_respects_destination_stock() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 10)).unwrap();
        let t = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 10)).unwrap();
        fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::Out, 4)).unwrap();

        let err = fx.depot.reverse_transfer(&fx.admin, t.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        // Still reversible once stock is back.
        fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, 4)).unwrap();
        assert!(fx.depot.reverse_transfer(&fx.admin, t.id).is_ok());
    }

    #[test]
    fn manager_cannot_reverse_transfers() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 10)).unwrap();
        let manager = fx.user("manager", Role::WarehouseManager);
        let t = fx.depot.perform_transfer(&manager, transfer(p1, w1, w2, 3)).unwrap();

        let err = fx.depot.reverse_transfer(&manager, t.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn restrict_policy_blocks_deleting_a_warehouse_in_use() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);

        let err = fx.depot.delete_warehouse(&fx.admin, w1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // W2 holds no products but does hold stock of P1.
        fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, 1)).unwrap();
        let err = fx.depot.delete_warehouse(&fx.admin, w2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.balance(p1, w2), 1);

        fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::Out, 1)).unwrap();
        fx.depot.delete_warehouse(&fx.admin, w2).unwrap();
        assert_eq!(fx.depot.warehouses(&fx.admin).unwrap().len(), 1);
    }

    #[test]
    fn cascade_policy_removes_products_and_balances_but_keeps_history() {
        let fx = fixture_with(DepotSettings {
            warehouse_delete: WarehouseDeletePolicy::Cascade,
            ..DepotSettings::default()
        });
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        let p2 = fx.product("P2", w2, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 8)).unwrap();
        fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 3)).unwrap();
        fx.depot.perform_movement(&fx.admin, movement(p2, w2, MovementKind::In, 4)).unwrap();
        fx.depot
            .create_order(
                &fx.admin,
                NewOrder {
                    product_id: p1,
                    quantity: 2,
                    order_type: OrderType::Supply,
                },
            )
            .unwrap();

        fx.depot.delete_warehouse(&fx.admin, w1).unwrap();

        assert!(fx.depot.product(&fx.admin, p1).is_err());
        assert!(fx.depot.product(&fx.admin, p2).is_ok());
        assert!(fx.depot.orders(&fx.admin).unwrap().is_empty());
        let remaining = fx.depot.balances(&fx.admin, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key(), BalanceKey::new(p2, w2));
        assert_eq!(fx.depot.movement_history(&fx.admin, p1, None).unwrap().len(), 3);

        // The removed product's rows are gone for good.
        let err = fx
            .depot
            .perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn product_delete_requires_empty_balances() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 2)).unwrap();

        let err = fx.depot.delete_product(&fx.admin, p1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 2)).unwrap();
        fx.depot.delete_product(&fx.admin, p1).unwrap();
        assert!(fx.depot.products(&fx.admin, ProductFilter::default()).unwrap().is_empty());
        assert!(fx.depot.balances(&fx.admin, Some(p1)).unwrap().is_empty());

        let deleted = fx
            .depot
            .audit_log(
                &fx.admin,
                &AuditFilter {
                    model_name: Some("Product".to_string()),
                    action: Some("delete_product".to_string()),
                },
            )
            .unwrap();
        assert_eq!(deleted.len(), 1);
    }

    #[test]
    fn sku_is_unique_and_immutable() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);

        let dup = fx
            .depot
            .create_product(
                &fx.admin,
                NewProduct {
                    name: "Other".to_string(),
                    sku: "P1".to_string(),
                    unit: "pcs".to_string(),
                    description: String::new(),
                    min_stock: 0,
                    warehouse_id: w1,
                    category_id: None,
                },
            )
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let err = fx
            .depot
            .update_product(
                &fx.admin,
                p1,
                ProductUpdate {
                    sku: Some("P9".to_string()),
                    ..ProductUpdate::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn order_lifecycle_moves_forward_only_and_never_touches_stock() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);
        let logistician = fx.user("logi", Role::Logistician);

        let order = fx
            .depot
            .create_order(
                &logistician,
                NewOrder {
                    product_id: p1,
                    quantity: 10,
                    order_type: OrderType::Shipment,
                },
            )
            .unwrap();
        let id = depot_core::Entity::id(&order);
        fx.depot.update_order_quantity(&logistician, id, 12).unwrap();
        fx.depot.advance_order(&logistician, id, OrderStatus::Processing).unwrap();

        let err = fx.depot.update_order_quantity(&logistician, id, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let done = fx.depot.advance_order(&logistician, id, OrderStatus::Completed).unwrap();
        assert_eq!(done.quantity(), 12);
        let err = fx.depot.advance_order(&logistician, id, OrderStatus::New).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(fx.balance(p1, w1), 0);
        assert_eq!(fx.inbox_of(logistician.user_id, NotificationCategory::Order).len(), 3);
        assert_eq!(fx.depot.delete_order(&logistician, id).unwrap_err().kind(), ErrorKind::PermissionDenied);
        fx.depot.delete_order(&fx.admin, id).unwrap();
    }

    #[test]
    fn inventory_count_defaults_to_current_balance() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 40)).unwrap();

        let count = fx
            .depot
            .create_inventory_count(
                &fx.admin,
                NewInventoryCount {
                    warehouse_id: w1,
                    product_id: p1,
                    recorded_quantity: None,
                    actual_quantity: 37,
                },
            )
            .unwrap();
        assert_eq!(count.recorded_quantity(), 40);
        assert_eq!(count.discrepancy(), -3);
        // Discrepancies are reported, not applied.
        assert_eq!(fx.balance(p1, w1), 40);
        assert_eq!(fx.inbox_of(fx.admin.user_id, NotificationCategory::Inventory).len(), 1);

        let id = depot_core::Entity::id(&count);
        let updated = fx.depot.update_inventory_count(&fx.admin, id, 40, 40).unwrap();
        assert_eq!(updated.discrepancy(), 0);
    }

    #[test]
    fn notifications_belong_to_their_recipient() {
        let fx = fixture();
        let clerk = fx.user("clerk", Role::Clerk);
        let other = fx.user("other", Role::Clerk);

        let sent = fx.depot.send_notification(&fx.admin, clerk.user_id, "Stocktake at 9").unwrap();
        assert_eq!(fx.depot.notifications(&clerk).unwrap().len(), 1);

        let err = fx.depot.mark_notification_read(&other, sent.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(fx.depot.mark_notification_read(&clerk, sent.id).unwrap().is_read);

        let err = fx.depot.send_notification(&clerk, other.user_id, "hi").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn users_cannot_reassign_their_own_role() {
        let fx = fixture();
        let clerk = fx.user("clerk", Role::Clerk);

        let promoted = fx.depot.assign_role(&fx.admin, clerk.user_id, Role::WarehouseManager).unwrap();
        assert_eq!(promoted.role, Role::WarehouseManager);
        let err = fx.depot.assign_role(&fx.admin, fx.admin.user_id, Role::Clerk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let dup = fx
            .depot
            .create_user(
                &fx.admin,
                NewUser {
                    username: "CLERK".to_string(),
                    email: String::new(),
                    role: None,
                },
            )
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn a_held_audit_write_only_blocks_its_own_rows() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 5)).unwrap();
        let (entered, release) = fx.audit.hold_next("outcome");

        thread::scope(|s| {
            let held = s.spawn(|| fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 5)));
            entered.recv().unwrap();

            fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, 3)).unwrap();
            fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::Out, 1)).unwrap();
            assert_eq!(fx.balance(p1, w2), 2);

            release.send(()).unwrap();
            held.join().unwrap().unwrap();
        });

        assert_eq!(fx.balance(p1, w1), 0);
        assert_eq!(fx.depot.ledger_net(&fx.admin, p1, w2).unwrap(), 2);
    }

    #[test]
    fn product_delete_never_strands_stock_from_a_racing_income() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 5)).unwrap();
        let (entered, release) = fx.audit.hold_next("outcome");

        let (outcome, deleted, income) = thread::scope(|s| {
            let outcome = s.spawn(|| fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 5)));
            entered.recv().unwrap();
            let deleted = s.spawn(|| fx.depot.delete_product(&fx.admin, p1));
            thread::sleep(Duration::from_millis(50));
            let income = s.spawn(|| fx.depot.perform_movement(&fx.admin, movement(p1, w2, MovementKind::In, 20)));
            thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
            (outcome.join().unwrap(), deleted.join().unwrap(), income.join().unwrap())
        });

        outcome.unwrap();
        // Either order is fine; stock on a deleted product is not.
        match deleted {
            Ok(_) => {
                assert_eq!(income.unwrap_err().kind(), ErrorKind::NotFound);
                assert!(fx.depot.balances(&fx.admin, Some(p1)).unwrap().is_empty());
            }
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Conflict);
                income.unwrap();
                assert!(fx.depot.product(&fx.admin, p1).is_ok());
                assert_eq!(fx.balance(p1, w2), 20);
            }
        }
        for w in [w1, w2] {
            assert_eq!(fx.depot.ledger_net(&fx.admin, p1, w).unwrap(), fx.balance(p1, w) as i128);
        }
    }

    #[test]
    fn warehouse_delete_waits_for_a_product_being_placed_there() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let (entered, release) = fx.audit.hold_next("create_product");

        let (created, deleted) = thread::scope(|s| {
            let created = s.spawn(|| fx.product("P1", w1, 0));
            entered.recv().unwrap();
            let deleted = s.spawn(|| fx.depot.delete_warehouse(&fx.admin, w1));
            thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
            (created.join().unwrap(), deleted.join().unwrap())
        });

        assert_eq!(deleted.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(fx.depot.product(&fx.admin, created).unwrap().warehouse_id, w1);
        assert!(fx.depot.warehouse(&fx.admin, w1).is_ok());
    }

    #[test]
    fn products_cannot_move_to_a_deleted_warehouse() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.delete_warehouse(&fx.admin, w2).unwrap();

        let err = fx
            .depot
            .update_product(
                &fx.admin,
                p1,
                ProductUpdate {
                    warehouse_id: Some(w2),
                    ..ProductUpdate::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("Warehouse"));
        assert_eq!(fx.depot.product(&fx.admin, p1).unwrap().warehouse_id, w1);
    }

    #[test]
    fn rejected_operations_on_unknown_records_leave_no_row_slots() {
        let fx = fixture();
        let w1 = fx.warehouse("W1");
        let p1 = fx.product("P1", w1, 0);

        for _ in 0..100 {
            let err = fx
                .depot
                .perform_movement(&fx.admin, movement(ProductId::new(), w1, MovementKind::In, 1))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            let err = fx
                .depot
                .perform_transfer(&fx.admin, transfer(p1, w1, WarehouseId::new(), 1))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert_eq!(fx.depot.balances.slot_count(), 0);
    }

    #[test]
    fn reversing_twice_is_a_conflict_even_when_the_destination_is_empty() {
        let fx = fixture();
        let (w1, w2) = (fx.warehouse("W1"), fx.warehouse("W2"));
        let p1 = fx.product("P1", w1, 0);
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::In, 10)).unwrap();
        let t = fx.depot.perform_transfer(&fx.admin, transfer(p1, w1, w2, 10)).unwrap();
        fx.depot.reverse_transfer(&fx.admin, t.id).unwrap();
        fx.depot.perform_movement(&fx.admin, movement(p1, w1, MovementKind::Out, 10)).unwrap();
        let audited = fx.audit_count();

        let err = fx.depot.reverse_transfer(&fx.admin, t.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.audit_count(), audited);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Income(usize, u64),
        Outcome(usize, u64),
        Transfer(usize, u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..2usize, 1..50u64).prop_map(|(w, q)| Op::Income(w, q)),
            (0..2usize, 1..50u64).prop_map(|(w, q)| Op::Outcome(w, q)),
            (0..2usize, 1..50u64).prop_map(|(w, q)| Op::Transfer(w, q)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn balance_always_equals_ledger_net(ops in proptest::collection::vec(op(), 1..40)) {
            let fx = fixture();
            let warehouses = [fx.warehouse("A"), fx.warehouse("B")];
            let p = fx.product("P", warehouses[0], 0);

            for op in ops {
                let _ = match op {
                    Op::Income(w, q) => fx.depot.perform_movement(&fx.admin, movement(p, warehouses[w], MovementKind::In, q)).map(|_| ()),
                    Op::Outcome(w, q) => fx.depot.perform_movement(&fx.admin, movement(p, warehouses[w], MovementKind::Out, q)).map(|_| ()),
                    Op::Transfer(w, q) => fx.depot.perform_transfer(&fx.admin, transfer(p, warehouses[w], warehouses[1 - w], q)).map(|_| ()),
                };
                for w in warehouses {
                    let net = fx.depot.ledger_net(&fx.admin, p, w).unwrap();
                    prop_assert_eq!(net, fx.balance(p, w) as i128);
                }
            }
        }
    }
}
