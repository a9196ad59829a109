use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use posture_model::{Notification, NotificationException};
use tracing::{debug, info};
use uuid::Uuid;

use super::NotificationService;
use crate::error::{CoreError, Result};

/// Notification service that writes each notification to the log and keeps
/// exceptions in memory.
#[derive(Debug, Default)]
pub struct LogNotifier {
    /// uuid -> exception; v7 uuids keep creation order
    exceptions: RwLock<BTreeMap<String, NotificationException>>,
}

impl LogNotifier {
    /// Notifier with no exceptions.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationService for LogNotifier {
    async fn batch_create_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>> {
        let now = Utc::now();
        let exceptions = self.exceptions.read();
        let created = notifications
            .into_iter()
            .filter(|n| {
                let silenced = exceptions.values().any(|e| e.silences(n, now));
                if silenced {
                    debug!(recipient = %n.recipient, name = %n.name, "notification silenced by exception");
                }
                !silenced
            })
            .map(|mut n| {
                n.uuid = Some(Uuid::now_v7());
                n.created_on = Some(now);
                info!(
                    recipient = %n.recipient,
                    name = %n.name,
                    source = %n.source_system,
                    "notification created"
                );
                n
            })
            .collect();
        Ok(created)
    }

    async fn get_exception(&self, uuid: &str) -> Result<NotificationException> {
        self.exceptions
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("exception {uuid}")))
    }

    async fn create_exception(
        &self,
        mut exception: NotificationException,
    ) -> Result<NotificationException> {
        exception.uuid = Uuid::now_v7().to_string();
        exception.created_on = Some(Utc::now());
        info!(
            uuid = %exception.uuid,
            user = %exception.user_email,
            name = %exception.notification_name,
            "notification exception created"
        );
        self.exceptions
            .write()
            .insert(exception.uuid.clone(), exception.clone());
        Ok(exception)
    }

    async fn update_exception(
        &self,
        mut exception: NotificationException,
    ) -> Result<NotificationException> {
        let mut exceptions = self.exceptions.write();
        let Some(existing) = exceptions.get_mut(&exception.uuid) else {
            return Err(CoreError::NotFound(format!("exception {}", exception.uuid)));
        };
        exception.created_on = existing.created_on;
        *existing = exception.clone();
        info!(uuid = %exception.uuid, "notification exception updated");
        Ok(exception)
    }

    async fn delete_exception(&self, uuid: &str) -> Result<()> {
        match self.exceptions.write().remove(uuid) {
            Some(_) => {
                info!(uuid = %uuid, "notification exception deleted");
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("exception {uuid}"))),
        }
    }

    async fn list_exceptions(
        &self,
        user_email: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Vec<NotificationException>> {
        let exceptions = self.exceptions.read();
        let owned = exceptions
            .values()
            .filter(|e| e.user_email == user_email)
            .filter(|e| page_token.is_none_or(|token| e.uuid.as_str() > token));
        let page = if page_size == 0 {
            owned.cloned().collect()
        } else {
            owned.take(page_size).cloned().collect()
        };
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use std::time::Duration;

    fn notification(recipient: &str, name: &str) -> Notification {
        Notification {
            uuid: None,
            source_system: "posture".into(),
            name: name.into(),
            recipient: recipient.into(),
            content: "body".into(),
            created_on: None,
            interval: Duration::from_secs(60),
        }
    }

    fn exception(user: &str, name: &str) -> NotificationException {
        NotificationException {
            user_email: user.into(),
            notification_name: name.into(),
            justification: "accepted risk".into(),
            ..NotificationException::default()
        }
    }

    #[tokio::test]
    async fn assigns_ids_without_retaining_notifications() {
        let notifier = LogNotifier::new();
        for _ in 0..100 {
            let created = notifier
                .batch_create_notifications(vec![notification("a@org.com", "RULE")])
                .await
                .expect("create");
            assert!(created[0].uuid.is_some());
            assert!(created[0].created_on.is_some());
        }
        assert!(notifier.exceptions.read().is_empty());
    }

    #[tokio::test]
    async fn active_exception_silences_matching_notifications() {
        let notifier = LogNotifier::new();
        notifier
            .create_exception(exception("a@org.com", "RULE"))
            .await
            .expect("exception");
        let mut expired = exception("b@org.com", "RULE");
        expired.valid_until = Some(Utc::now() - TimeDelta::hours(1));
        notifier.create_exception(expired).await.expect("exception");

        let created = notifier
            .batch_create_notifications(vec![
                notification("a@org.com", "RULE"),
                notification("a@org.com", "OTHER"),
                notification("b@org.com", "RULE"),
            ])
            .await
            .expect("create");
        let delivered: Vec<(&str, &str)> = created
            .iter()
            .map(|n| (n.recipient.as_str(), n.name.as_str()))
            .collect();
        assert_eq!(delivered, vec![("a@org.com", "OTHER"), ("b@org.com", "RULE")]);
    }

    #[tokio::test]
    async fn exceptions_support_crud_and_paging() {
        let notifier = LogNotifier::new();
        let mut ids = Vec::new();
        for name in ["R1", "R2", "R3"] {
            let created = notifier
                .create_exception(exception("a@org.com", name))
                .await
                .expect("create");
            assert!(created.created_on.is_some());
            ids.push(created.uuid);
        }
        notifier
            .create_exception(exception("b@org.com", "R1"))
            .await
            .expect("create");

        let first = notifier
            .list_exceptions("a@org.com", 2, None)
            .await
            .expect("list");
        assert_eq!(first.len(), 2);
        let rest = notifier
            .list_exceptions("a@org.com", 2, Some(first[1].uuid.as_str()))
            .await
            .expect("list");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].notification_name, "R3");

        let mut changed = notifier.get_exception(&ids[0]).await.expect("get");
        changed.justification = "extended".into();
        let updated = notifier.update_exception(changed).await.expect("update");
        assert_eq!(updated.justification, "extended");
        assert!(updated.created_on.is_some());

        notifier.delete_exception(&ids[0]).await.expect("delete");
        assert!(matches!(
            notifier.get_exception(&ids[0]).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            notifier.delete_exception(&ids[0]).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
