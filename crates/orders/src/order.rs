use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, Entity, OrderId, ProductId, Timestamped, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Supply,
    Shipment,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Supply => "supply",
            OrderType::Shipment => "shipment",
        }
    }
}

impl core::str::FromStr for OrderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supply" => Ok(OrderType::Supply),
            "shipment" => Ok(OrderType::Shipment),
            other => Err(DomainError::validation(format!("unknown order type: {other}"))),
        }
    }
}

/// Order status lifecycle. Moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
        }
    }

    /// The only status this one may advance to.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::New => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(OrderStatus::New),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(DomainError::validation(format!("unknown order status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    product_id: ProductId,
    quantity: u64,
    order_type: OrderType,
    status: OrderStatus,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub quantity: u64,
    pub order_type: OrderType,
}

impl NewOrder {
    pub fn into_order(self, created_by: UserId, now: DateTime<Utc>) -> Result<Order, DomainError> {
        check_quantity(self.quantity)?;
        Ok(Order {
            id: OrderId::new(),
            product_id: self.product_id,
            quantity: self.quantity,
            order_type: self.order_type,
            status: OrderStatus::New,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }
}

impl Order {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move to `target`, which must be the immediate successor.
    pub fn advance(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.next() != Some(target) {
            return Err(DomainError::conflict(format!(
                "order cannot move from {} to {}",
                self.status, target
            )));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: u64, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != OrderStatus::New {
            return Err(DomainError::conflict("order quantity is fixed once processing starts"));
        }
        check_quantity(quantity)?;
        self.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;
    const MODEL_NAME: &'static str = "Order";

    fn id(&self) -> OrderId {
        self.id
    }
}

impl Timestamped for Order {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn check_quantity(quantity: u64) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }
    if quantity > i64::MAX as u64 {
        return Err(DomainError::validation("quantity is too large"));
    }
    Ok(())
}
