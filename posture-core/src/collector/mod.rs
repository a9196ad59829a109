//! Cloud inventory collection.

mod fixture;

pub use fixture::{FixtureCollector, Inventory};

use async_trait::async_trait;
use posture_model::{CollectId, Resource};

use crate::error::Result;

/// Enumerates resource groups and persists their resources.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Resource group records without IAM policy. `None` lists every group.
    async fn list_resource_groups(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<Resource>>;

    /// Names of every resource group the collector can reach.
    async fn list_resource_group_names(&self) -> Result<Vec<String>>;

    /// Fetches the full resources of `groups`, IAM policies included, and
    /// stores them tagged with `collect_id`. `pre_collected` holds group
    /// records already fetched for this collection.
    async fn collect_and_store_all(
        &self,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> Result<()>;
}
