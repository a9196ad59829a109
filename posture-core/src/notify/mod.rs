//! Delivery of notifications to human recipients, and the exceptions users
//! register to silence them.

mod log_notifier;

pub use log_notifier::LogNotifier;

use async_trait::async_trait;
use posture_model::{Notification, NotificationException};

use crate::error::{CoreError, Result};

fn unsupported() -> CoreError {
    CoreError::Notification("notification exceptions are not supported".into())
}

/// Sink for notifications and store of the exceptions that silence them.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Submits every notification in one call and returns them as created.
    /// Notifications silenced by an exception are not returned.
    async fn batch_create_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>>;

    /// Exception by uuid, `NotFound` when absent.
    async fn get_exception(&self, _uuid: &str) -> Result<NotificationException> {
        Err(unsupported())
    }

    /// Stores a new exception and returns it with its uuid and creation time.
    async fn create_exception(
        &self,
        _exception: NotificationException,
    ) -> Result<NotificationException> {
        Err(unsupported())
    }

    /// Replaces an existing exception, keyed by its uuid.
    async fn update_exception(
        &self,
        _exception: NotificationException,
    ) -> Result<NotificationException> {
        Err(unsupported())
    }

    /// Removes an exception, `NotFound` when absent.
    async fn delete_exception(&self, _uuid: &str) -> Result<()> {
        Err(unsupported())
    }

    /// Exceptions owned by `user_email` in creation order. `page_token` is
    /// the uuid of the last exception of the previous page; a `page_size` of
    /// zero returns everything left.
    async fn list_exceptions(
        &self,
        _user_email: &str,
        _page_size: usize,
        _page_token: Option<&str>,
    ) -> Result<Vec<NotificationException>> {
        Err(unsupported())
    }
}
