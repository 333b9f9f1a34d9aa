//! Supply / shipment orders. Planning records only; balances are untouched.

use chrono::Utc;
use tracing::{info, instrument};

use depot_auth::{Action, Principal};
use depot_core::{DomainResult, Entity, OrderId, Timestamped};
use depot_orders::{NewOrder, Order, OrderStatus};

use crate::audit::NewAuditEntry;
use crate::effects::SideEffects;
use crate::notifications::NotificationCategory;

use super::Depot;

impl Depot {
    #[instrument(skip(self, principal, input), fields(user = %principal.username), err)]
    pub fn create_order(&self, principal: &Principal, input: NewOrder) -> DomainResult<Order> {
        self.guard(principal, Action::CreateOrder)?;
        let gate = self.catalog_shared()?;
        let product = self.products.require(input.product_id)?;
        let order = input.into_order(principal.user_id, Utc::now())?;
        let order = self.orders.insert_with(order, |o, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "create_order",
                o,
                format!("{} order for {} x {}", o.order_type().as_str(), o.quantity(), product.sku),
            ))
        })?;
        drop(gate);
        info!(order_id = %order.id(), "order created");

        let mut fx = SideEffects::new();
        fx.notify(
            principal.user_id,
            format!(
                "New {} order for {} ({} units)",
                order.order_type().as_str(),
                product.name,
                order.quantity()
            ),
            NotificationCategory::Order,
        );
        self.finish(fx);
        Ok(order)
    }

    /// Advance the status one step (`new → processing → completed`).
    #[instrument(skip(self, principal), fields(user = %principal.username, target = %status), err)]
    pub fn advance_order(&self, principal: &Principal, order_id: OrderId, status: OrderStatus) -> DomainResult<Order> {
        self.guard(principal, Action::UpdateOrder)?;
        let order = self.orders.update(order_id, |o, _| {
            let from = o.status();
            o.advance(status, Utc::now())?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_order",
                o,
                format!("Status {from} -> {status}"),
            ))
        })?;

        if let Some(creator) = order.created_by() {
            let mut fx = SideEffects::new();
            fx.notify(creator, format!("Order {order_id} is now {status}"), NotificationCategory::Order);
            self.finish(fx);
        }
        Ok(order)
    }

    /// Change the quantity of an order that has not started processing.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn update_order_quantity(&self, principal: &Principal, order_id: OrderId, quantity: u64) -> DomainResult<Order> {
        self.guard(principal, Action::UpdateOrder)?;
        self.orders.update(order_id, |o, _| {
            let before = o.quantity();
            o.set_quantity(quantity, Utc::now())?;
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "update_order",
                o,
                format!("Quantity {before} -> {quantity}"),
            ))
        })
    }

    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn delete_order(&self, principal: &Principal, order_id: OrderId) -> DomainResult<Order> {
        self.guard(principal, Action::DeleteOrder)?;
        self.orders.remove_with(order_id, |o, _| {
            self.record(NewAuditEntry::for_entity(
                Some(principal.user_id),
                "delete_order",
                o,
                format!("Deleted {} order in status {}", o.order_type().as_str(), o.status()),
            ))
        })
    }

    pub fn order(&self, principal: &Principal, order_id: OrderId) -> DomainResult<Order> {
        self.guard(principal, Action::ViewOrders)?;
        self.orders.require(order_id)
    }

    /// Orders, newest first.
    pub fn orders(&self, principal: &Principal) -> DomainResult<Vec<Order>> {
        self.guard(principal, Action::ViewOrders)?;
        let mut all = self.orders.list()?;
        all.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(all)
    }
}
