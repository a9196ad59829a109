//! Persistence of resources, observations and the operation log.

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use posture_model::{Observation, Operation, Resource, StorageFilter};

use crate::error::Result;

/// Persistence of everything a run produces.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores resource snapshots and returns them as stored.
    async fn batch_create_resources(
        &self,
        resources: Vec<Resource>,
    ) -> Result<Vec<Resource>>;

    /// Resources matching every constraint of `filter`.
    async fn list_resources(&self, filter: &StorageFilter) -> Result<Vec<Resource>>;

    /// Stores observations and returns them as stored.
    async fn batch_create_observations(
        &self,
        observations: Vec<Observation>,
    ) -> Result<Vec<Observation>>;

    /// Observations matching `filter`. The operation id matches either the
    /// collection or the scan an observation belongs to.
    async fn list_observations(
        &self,
        filter: &StorageFilter,
    ) -> Result<Vec<Observation>>;

    /// Buffers operation log entries until the next [`Storage::flush_ops_log`].
    async fn add_operation_log(&self, ops: Vec<Operation>) -> Result<()>;

    /// Persists every buffered operation log entry.
    async fn flush_ops_log(&self) -> Result<()>;

    /// Flushed operation log entries, oldest first. Matches on resource
    /// group, operation id and the time window of `filter`.
    async fn list_operations(&self, filter: &StorageFilter) -> Result<Vec<Operation>>;
}
