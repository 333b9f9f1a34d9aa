//! Post-commit side effects.
//!
//! Workflows collect notifications and cache signals while they run and hand
//! them over only after commit. Failures are logged and swallowed.

use depot_core::UserId;

use crate::cache::{CacheInvalidator, CacheScope};
use crate::notifications::{NotificationCategory, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub recipient: UserId,
    pub message: String,
    pub category: NotificationCategory,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SideEffects {
    notifications: Vec<PendingNotification>,
    invalidations: Vec<CacheScope>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, recipient: UserId, message: impl Into<String>, category: NotificationCategory) -> &mut Self {
        self.notifications.push(PendingNotification {
            recipient,
            message: message.into(),
            category,
        });
        self
    }

    pub fn invalidate(&mut self, scope: CacheScope) -> &mut Self {
        if !self.invalidations.contains(&scope) {
            self.invalidations.push(scope);
        }
        self
    }

    pub fn notifications(&self) -> &[PendingNotification] {
        &self.notifications
    }

    /// Deliver everything; returns how many deliveries failed.
    pub fn dispatch(self, notifier: &dyn Notifier, cache: &dyn CacheInvalidator) -> usize {
        let mut failures = 0;
        for n in self.notifications {
            if let Err(err) = notifier.notify(n.recipient, &n.message, n.category) {
                failures += 1;
                tracing::warn!(
                    recipient = %n.recipient,
                    category = n.category.as_str(),
                    error = %err,
                    "notification dropped"
                );
            }
        }
        for scope in self.invalidations {
            if let Err(err) = cache.invalidate(scope) {
                failures += 1;
                tracing::warn!(scope = scope.as_str(), error = %err, "cache invalidation dropped");
            }
        }
        failures
    }
}
