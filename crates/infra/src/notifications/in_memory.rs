use std::sync::RwLock;

use chrono::Utc;

use depot_core::{NotificationId, UserId};

use super::{Notification, NotificationCategory, Notifier, NotifyError};

#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    inner: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification ever sent, oldest first.
    pub fn all(&self) -> Vec<Notification> {
        match self.inner.read() {
            Ok(items) => items.clone(),
            Err(_) => vec![],
        }
    }
}

fn poisoned() -> NotifyError {
    NotifyError::Delivery("lock poisoned".to_string())
}

impl Notifier for InMemoryNotificationStore {
    fn notify(&self, recipient: UserId, message: &str, category: NotificationCategory) -> Result<Notification, NotifyError> {
        let notification = Notification {
            id: NotificationId::new(),
            recipient,
            message: message.to_string(),
            category,
            is_read: false,
            created_at: Utc::now(),
        };
        let mut items = self.inner.write().map_err(|_| poisoned())?;
        items.push(notification.clone());
        Ok(notification)
    }

    fn inbox(&self, recipient: UserId) -> Result<Vec<Notification>, NotifyError> {
        let items = self.inner.read().map_err(|_| poisoned())?;
        Ok(items.iter().rev().filter(|n| n.recipient == recipient).cloned().collect())
    }

    fn get(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError> {
        let items = self.inner.read().map_err(|_| poisoned())?;
        Ok(items.iter().find(|n| n.id == id).cloned())
    }

    fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>, NotifyError> {
        let mut items = self.inner.write().map_err(|_| poisoned())?;
        Ok(items.iter_mut().find(|n| n.id == id).map(|n| {
            n.is_read = true;
            n.clone()
        }))
    }
}
