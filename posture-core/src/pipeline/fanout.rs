use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use posture_model::{Notification, Observation, ResourceKind, StorageFilter};
use tracing::{debug, info, warn};

use super::contacts::ContactResolver;
use crate::config::NotificationConfig;
use crate::error::{CoreError, Result};
use crate::notify::NotificationService;
use crate::storage::Storage;

/// Turns observation batches into one notification per contact and submits
/// each batch in a single call.
pub struct NotificationFanout {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn NotificationService>,
    resolver: ContactResolver,
    interval: Duration,
    source_system: String,
}

impl fmt::Debug for NotificationFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationFanout")
            .field("resolver", &self.resolver)
            .field("interval", &self.interval)
            .field("source_system", &self.source_system)
            .finish_non_exhaustive()
    }
}

impl NotificationFanout {
    /// Fan-out delivering through `notifier`, with contacts looked up in `storage`.
    pub fn new(
        config: &NotificationConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn NotificationService>,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            notifier,
            resolver: ContactResolver::new(config)?,
            interval: config.notification_interval,
            source_system: config.source_system.clone(),
        })
    }

    /// Notifications for one observation, one per resolved contact.
    pub async fn notifications_for(
        &self,
        observation: &Observation,
    ) -> Result<Vec<Notification>> {
        let group = observation.resource_group_name();
        let mut filter = StorageFilter::new()
            .groups([group])
            .names([group])
            .kinds([ResourceKind::ResourceGroup])
            .limit(2);
        if let Some(collection) = &observation.collection_id {
            filter = filter.operation(collection.as_str());
        }

        let found = self.storage.list_resources(&filter).await?;
        let Some(record) = found.first() else {
            return Err(CoreError::NotFound(format!(
                "no resource found for resource group {group}"
            )));
        };
        if found.len() > 1 {
            warn!(group = %group, "more than one resource group record found, using the first");
        }

        let contacts = self.resolver.contacts(record);
        if contacts.is_empty() {
            return Err(CoreError::NoContacts(group.to_string()));
        }

        let content = format!(
            "{}\n\n{}",
            observation.remediation.description, observation.remediation.recommendation
        );
        Ok(contacts
            .into_iter()
            .map(|recipient| Notification {
                uuid: None,
                source_system: self.source_system.clone(),
                name: observation.name.clone(),
                recipient,
                content: content.clone(),
                created_on: None,
                interval: self.interval,
            })
            .collect())
    }

    /// Builds and submits the notifications for a batch. Failures are logged;
    /// returns how many notifications were accepted.
    pub async fn dispatch(&self, observations: &[Observation]) -> usize {
        let mut notifications = Vec::new();
        for observation in observations {
            match self.notifications_for(observation).await {
                Ok(built) => notifications.extend(built),
                Err(err) => warn!(
                    observation = %observation.name,
                    group = %observation.resource_group_name(),
                    error = %err,
                    "no notification for observation"
                ),
            }
        }

        if notifications.is_empty() {
            debug!(observations = observations.len(), "batch produced no notifications");
            return 0;
        }

        let total = notifications.len();
        match self.notifier.batch_create_notifications(notifications).await {
            Ok(created) => {
                info!(submitted = total, created = created.len(), "notifications submitted");
                created.len()
            }
            Err(err) => {
                warn!(submitted = total, error = %err, "batch create notifications");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use posture_model::{Permission, Remediation, Resource, ResourceRef};

    /// Keeps every submitted notification for inspection.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<Notification> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl NotificationService for RecordingNotifier {
        async fn batch_create_notifications(
            &self,
            notifications: Vec<Notification>,
        ) -> Result<Vec<Notification>> {
            self.sent.lock().extend(notifications.iter().cloned());
            Ok(notifications)
        }
    }

    struct RejectingNotifier;

    #[async_trait]
    impl NotificationService for RejectingNotifier {
        async fn batch_create_notifications(
            &self,
            _notifications: Vec<Notification>,
        ) -> Result<Vec<Notification>> {
            Err(CoreError::Notification("service unavailable".into()))
        }
    }

    fn config() -> NotificationConfig {
        NotificationConfig {
            org_suffix: "@org.com".into(),
            ..NotificationConfig::default()
        }
    }

    fn finding(name: &str, group: &str, collection: &str) -> Observation {
        Observation {
            name: name.into(),
            resource_ref: ResourceRef {
                name: group.into(),
                resource_group_name: group.into(),
                uid: None,
            },
            collection_id: Some(collection.into()),
            remediation: Remediation {
                description: "what".into(),
                recommendation: "fix".into(),
            },
            ..Observation::default()
        }
    }

    async fn seeded_storage() -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        let mut rg = Resource::resource_group("g1")
            .with_permission(Permission::new("roles/owner", ["user:alice@org.com"]))
            .with_label("contact1", "bob_org_com");
        rg.collection_uid = Some("c1".into());
        let mut bare = Resource::resource_group("g2");
        bare.collection_uid = Some("c1".into());
        storage
            .batch_create_resources(vec![rg, bare])
            .await
            .expect("seed");
        storage
    }

    #[tokio::test]
    async fn one_notification_per_contact() {
        let storage = seeded_storage().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let fanout = NotificationFanout::new(&config(), storage, notifier.clone()).expect("fanout");

        let sent = fanout
            .dispatch(&[finding("R1", "g1", "c1"), finding("R2", "g1", "c1")])
            .await;

        assert_eq!(sent, 4);
        let recorded = notifier.sent();
        assert!(recorded.iter().all(|n| n.content == "what\n\nfix"));
        assert!(recorded.iter().any(|n| n.recipient == "bob@org.com" && n.name == "R2"));
        assert!(recorded.iter().all(|n| n.interval == Duration::from_secs(86_400)));
    }

    #[tokio::test]
    async fn missing_group_and_missing_contacts_are_skipped() {
        let storage = seeded_storage().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let fanout = NotificationFanout::new(&config(), storage, notifier.clone()).expect("fanout");

        let err = fanout
            .notifications_for(&finding("R", "g2", "c1"))
            .await
            .expect_err("no contacts");
        assert!(matches!(err, CoreError::NoContacts(_)));

        let err = fanout
            .notifications_for(&finding("R", "g1", "other-collection"))
            .await
            .expect_err("no record");
        assert!(matches!(err, CoreError::NotFound(_)));

        let sent = fanout
            .dispatch(&[finding("R", "g2", "c1"), finding("R", "g1", "c1")])
            .await;
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn submission_failure_is_not_fatal() {
        let storage = seeded_storage().await;
        let fanout = NotificationFanout::new(&config(), storage, Arc::new(RejectingNotifier))
            .expect("fanout");

        assert_eq!(fanout.dispatch(&[finding("R", "g1", "c1")]).await, 0);
    }
}
