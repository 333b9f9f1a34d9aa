//! Notification collaborator.
//!
//! Notifications are side effects of core operations: they are sent after
//! the triggering mutation has committed and a failure never undoes it.

pub mod in_memory;

pub use in_memory::InMemoryNotificationStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::{DomainError, NotificationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    LowStock,
    Order,
    Inventory,
    General,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::LowStock => "low_stock",
            NotificationCategory::Order => "order",
            NotificationCategory::Inventory => "inventory",
            NotificationCategory::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub message: String,
    pub category: NotificationCategory,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

impl From<NotifyError> for DomainError {
    fn from(value: NotifyError) -> Self {
        DomainError::Internal(value.to_string())
    }
}

/// Delivery plus the per-user inbox.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: UserId, message: &str, category: NotificationCategory) -> Result<Notification, NotifyError>;

    /// Everything addressed to `recipient`, newest first.
    fn inbox(&self, recipient: UserId) -> Result<Vec<Notification>, NotifyError>;

    fn get(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError>;

    /// Flag as read; `None` when the notification does not exist.
    fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError>;
}

impl<T> Notifier for Arc<T>
where
    T: Notifier + ?Sized,
{
    fn notify(&self, recipient: UserId, message: &str, category: NotificationCategory) -> Result<Notification, NotifyError> {
        (**self).notify(recipient, message, category)
    }

    fn inbox(&self, recipient: UserId) -> Result<Vec<Notification>, NotifyError> {
        (**self).inbox(recipient)
    }

    fn get(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError> {
        (**self).get(id)
    }

    fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError> {
        (**self).mark_read(id)
    }
}
