use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Request to notify one recipient about one finding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notification {
    /// Assigned by the notification service on creation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uuid: Option<Uuid>,
    pub source_system: String,
    /// Name of the finding, used by the notification service to group
    /// repeated notifications.
    pub name: String,
    pub recipient: String,
    pub content: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_on: Option<DateTime<Utc>>,
    /// Minimum time between two deliveries of the same notification.
    pub interval: Duration,
}

/// A user's opt-out from one kind of notification until `valid_until`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationException {
    /// Assigned by the notification service on creation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uuid: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub source_system: String,
    /// Owner of the exception. Always the authenticated caller.
    #[cfg_attr(feature = "serde", serde(default))]
    pub user_email: String,
    /// Finding name the exception silences.
    pub notification_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub justification: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_on: Option<DateTime<Utc>>,
    /// End of the exception. `None` never expires.
    #[cfg_attr(feature = "serde", serde(default))]
    pub valid_until: Option<DateTime<Utc>>,
}

impl NotificationException {
    /// Whether this exception silences `notification` at `now`.
    pub fn silences(&self, notification: &Notification, now: DateTime<Utc>) -> bool {
        self.user_email == notification.recipient
            && self.notification_name == notification.name
            && self.valid_until.is_none_or(|until| until > now)
    }
}
