use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use posture_model::{
    CollectId, Operation, OperationKind, OperationStatus, Resource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Collector;
use crate::error::{CoreError, Result};
use crate::storage::Storage;

/// Static cloud inventory: every resource, grouped under its resource group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Resource groups and their members, in any order.
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Inventory {
    /// Parses an inventory from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads and parses the JSON inventory at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Adds one resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    fn group_names(&self) -> Vec<String> {
        self.resources
            .iter()
            .filter(|r| r.is_resource_group())
            .map(|r| r.name.clone())
            .collect()
    }
}

/// Collector that serves a fixed [`Inventory`] and writes snapshots of it
/// into storage.
pub struct FixtureCollector {
    inventory: Inventory,
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for FixtureCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureCollector")
            .field("resources", &self.inventory.resources.len())
            .finish_non_exhaustive()
    }
}

impl FixtureCollector {
    /// Collector serving `inventory` and writing into `storage`.
    pub fn new(inventory: Inventory, storage: Arc<dyn Storage>) -> Self {
        Self { inventory, storage }
    }

    async fn log_collection(
        &self,
        collect_id: &CollectId,
        groups: &[String],
        status: OperationStatus,
    ) -> Result<()> {
        let ops = groups
            .iter()
            .map(|group| {
                Operation::now(
                    collect_id.as_str(),
                    group.as_str(),
                    OperationKind::Collect,
                    status,
                )
            })
            .collect();
        self.storage.add_operation_log(ops).await
    }
}

#[async_trait]
impl Collector for FixtureCollector {
    async fn list_resource_groups(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<Resource>> {
        Ok(self
            .inventory
            .resources
            .iter()
            .filter(|r| r.is_resource_group())
            .filter(|r| names.is_none_or(|names| names.contains(&r.name)))
            .map(|r| Resource {
                iam_policy: None,
                ..r.clone()
            })
            .collect())
    }

    async fn list_resource_group_names(&self) -> Result<Vec<String>> {
        Ok(self.inventory.group_names())
    }

    async fn collect_and_store_all(
        &self,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> Result<()> {
        self.log_collection(collect_id, groups, OperationStatus::Started)
            .await?;

        // Group records already fetched keep their skeleton fields; the
        // policy always comes from the inventory.
        let skeletons: BTreeMap<&str, &Resource> = pre_collected
            .iter()
            .map(|r| (r.name.as_str(), r))
            .collect();

        let now = Utc::now();
        let mut batch = Vec::new();
        for group in groups {
            let members: Vec<&Resource> = self
                .inventory
                .resources
                .iter()
                .filter(|r| &r.resource_group_name == group)
                .collect();
            if members.is_empty() {
                return Err(CoreError::Collector(format!(
                    "resource group {group} not found in inventory"
                )));
            }
            for resource in members {
                let mut snapshot = match skeletons.get(resource.name.as_str()) {
                    Some(skeleton) => Resource {
                        iam_policy: resource.iam_policy.clone(),
                        ..(*skeleton).clone()
                    },
                    None => resource.clone(),
                };
                snapshot.collection_uid = Some(collect_id.to_string());
                snapshot.timestamp = Some(now);
                batch.push(snapshot);
            }
        }

        debug!(collect_id = %collect_id, resources = batch.len(), "storing collected resources");
        self.storage.batch_create_resources(batch).await?;
        self.log_collection(collect_id, groups, OperationStatus::Completed)
            .await?;
        info!(collect_id = %collect_id, groups = groups.len(), "collection stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use posture_model::{Permission, ResourceKind, StorageFilter};

    fn inventory() -> Inventory {
        Inventory::default()
            .with_resource(
                Resource::resource_group("projects/a")
                    .with_permission(Permission::new("roles/owner", ["user:a@org.com"])),
            )
            .with_resource(Resource::member("bucket-1", "projects/a", ResourceKind::Bucket))
            .with_resource(Resource::resource_group("projects/b"))
    }

    #[tokio::test]
    async fn skeletons_omit_iam_policy() {
        let storage = Arc::new(InMemoryStorage::new());
        let collector = FixtureCollector::new(inventory(), storage);

        let groups = collector.list_resource_groups(None).await.expect("list");
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.iam_policy.is_none()));

        let only_b = collector
            .list_resource_groups(Some(&["projects/b".to_string()]))
            .await
            .expect("list");
        assert_eq!(only_b.len(), 1);
    }

    #[tokio::test]
    async fn collect_stores_tagged_resources_with_policy() {
        let storage = Arc::new(InMemoryStorage::new());
        let collector = FixtureCollector::new(inventory(), storage.clone());
        let collect_id = CollectId::from("c1");

        collector
            .collect_and_store_all(&collect_id, &["projects/a".to_string()], &[])
            .await
            .expect("collect");

        let stored = storage
            .list_resources(&StorageFilter::new().operation("c1"))
            .await
            .expect("list");
        assert_eq!(stored.len(), 2);
        let group = stored
            .iter()
            .find(|r| r.is_resource_group())
            .expect("group stored");
        assert!(group.iam_policy.is_some());
        assert_eq!(storage.pending_operations().len(), 2);
    }

    #[tokio::test]
    async fn unknown_group_is_a_collector_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let collector = FixtureCollector::new(inventory(), storage);

        let err = collector
            .collect_and_store_all(&CollectId::from("c"), &["projects/zzz".to_string()], &[])
            .await
            .expect_err("missing group");
        assert!(matches!(err, CoreError::Collector(_)));
    }

    #[test]
    fn inventory_parses_from_json() {
        let raw = r#"{
            "resources": [
                {"name": "projects/x", "resource_group_name": "projects/x", "kind": "resource_group",
                 "labels": {"contact1": "bob_org_com"}}
            ]
        }"#;
        let inventory = Inventory::from_json(raw).expect("parse");
        assert_eq!(inventory.group_names(), vec!["projects/x".to_string()]);
    }

    #[test]
    fn inventory_loads_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"resources": [
                {{"name": "projects/y", "resource_group_name": "projects/y", "kind": "resource_group"}},
                {{"name": "bucket-y", "resource_group_name": "projects/y", "kind": "bucket"}}
            ]}}"#
        )
        .expect("write inventory");

        let inventory = Inventory::load(file.path()).expect("load");
        assert_eq!(inventory.resources.len(), 2);
        assert_eq!(inventory.group_names(), vec!["projects/y".to_string()]);

        let dir = tempfile::tempdir().expect("temp dir");
        let err = Inventory::load(&dir.path().join("missing.json")).expect_err("no file");
        assert!(matches!(err, CoreError::Io(_)));
    }
}
