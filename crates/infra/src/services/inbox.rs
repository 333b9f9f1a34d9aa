//! Per-user notification inbox.

use tracing::{instrument, warn};

use depot_auth::{Action, Principal};
use depot_core::{DomainError, DomainResult, NotificationId, UserId};

use crate::notifications::{Notification, NotificationCategory};

use super::Depot;

impl Depot {
    /// The caller's own notifications, newest first.
    pub fn notifications(&self, principal: &Principal) -> DomainResult<Vec<Notification>> {
        self.guard(principal, Action::ViewOwnNotifications)?;
        Ok(self.notifier.inbox(principal.user_id)?)
    }

    /// Only the recipient may mark a notification read.
    #[instrument(skip(self, principal), fields(user = %principal.username), err)]
    pub fn mark_notification_read(&self, principal: &Principal, notification_id: NotificationId) -> DomainResult<Notification> {
        self.guard(principal, Action::MarkNotificationRead)?;
        let notification = self
            .notifier
            .get(notification_id)?
            .ok_or(DomainError::NotFound("Notification"))?;
        if notification.recipient != principal.user_id {
            warn!(%notification_id, "attempt to mark another user's notification");
            return Err(DomainError::permission_denied("only the recipient may mark a notification read"));
        }
        self.notifier
            .mark_read(notification_id)?
            .ok_or(DomainError::NotFound("Notification"))
    }

    /// Send a `general` notification to a user. Delivery failure is the
    /// caller's error here: the notification is the whole operation.
    #[instrument(skip(self, principal, message), fields(user = %principal.username), err)]
    pub fn send_notification(&self, principal: &Principal, recipient: UserId, message: &str) -> DomainResult<Notification> {
        self.guard(principal, Action::SendNotification)?;
        if message.trim().is_empty() {
            return Err(DomainError::validation("message cannot be empty"));
        }
        self.users.require(recipient)?;
        Ok(self.notifier.notify(recipient, message.trim(), NotificationCategory::General)?)
    }
}
