use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use posture_model::{Observation, Operation, Resource, StorageFilter};
use tracing::warn;

use super::Storage;
use crate::error::{CoreError, Result};

#[derive(Default)]
struct Tables {
    /// resource group -> resources in insertion order
    resources: HashMap<String, Vec<Resource>>,
    /// resource group -> observations in insertion order
    observations: HashMap<String, Vec<Observation>>,
    pending_ops: Vec<Operation>,
    operations: Vec<Operation>,
}

/// Process-local storage backend, used for local runs and tests.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("InMemoryStorage")
            .field("resource_groups", &tables.resources.len())
            .field("observation_groups", &tables.observations.len())
            .field("operations", &tables.operations.len())
            .finish()
    }
}

impl InMemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation log entries persisted by the last flush.
    pub fn operations(&self) -> Vec<Operation> {
        self.tables.read().operations.clone()
    }

    /// Operation log entries waiting for a flush.
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.tables.read().pending_ops.clone()
    }
}

fn time_window(
    filter: &StorageFilter,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    match (filter.start_time, filter.time_offset) {
        (None, None) => Ok(None),
        (Some(start), Some(offset)) => Ok(Some((start, start + offset))),
        _ => Err(CoreError::InvalidInput(
            "start_time and time_offset must both be set".into(),
        )),
    }
}

fn within(
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    timestamp: Option<DateTime<Utc>>,
) -> bool {
    match (window, timestamp) {
        (None, _) => true,
        (Some((start, end)), Some(ts)) => ts > start && ts <= end,
        (Some(_), None) => false,
    }
}

fn selected_groups<'a, T>(
    table: &'a HashMap<String, Vec<T>>,
    filter: &StorageFilter,
) -> Vec<&'a Vec<T>> {
    match &filter.resource_group_names {
        Some(names) => names.iter().filter_map(|n| table.get(n)).collect(),
        None => {
            let mut keys: Vec<&String> = table.keys().collect();
            keys.sort();
            keys.into_iter().filter_map(|k| table.get(k)).collect()
        }
    }
}

fn matches_names(filter: &StorageFilter, name: &str) -> bool {
    filter
        .resource_names
        .as_ref()
        .is_none_or(|names| names.iter().any(|n| n == name))
}

fn resource_matches(
    filter: &StorageFilter,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    resource: &Resource,
) -> bool {
    let kind_ok = filter
        .resource_kinds
        .as_ref()
        .is_none_or(|kinds| kinds.contains(&resource.kind));
    let op_ok = filter
        .operation_id
        .as_ref()
        .is_none_or(|id| resource.collection_uid.as_ref() == Some(id));
    kind_ok
        && op_ok
        && matches_names(filter, &resource.name)
        && within(window, resource.timestamp)
}

fn observation_matches(
    filter: &StorageFilter,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    observation: &Observation,
) -> bool {
    let op_ok = filter.operation_id.as_ref().is_none_or(|id| {
        observation.collection_id.as_ref() == Some(id)
            || observation.scan_id.as_ref() == Some(id)
    });
    op_ok
        && matches_names(filter, &observation.resource_ref.name)
        && within(window, observation.timestamp)
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn batch_create_resources(
        &self,
        resources: Vec<Resource>,
    ) -> Result<Vec<Resource>> {
        let mut tables = self.tables.write();
        for resource in &resources {
            tables
                .resources
                .entry(resource.resource_group_name.clone())
                .or_default()
                .push(resource.clone());
        }
        Ok(resources)
    }

    async fn list_resources(&self, filter: &StorageFilter) -> Result<Vec<Resource>> {
        let window = time_window(filter)?;
        let tables = self.tables.read();
        let mut result: Vec<Resource> = selected_groups(&tables.resources, filter)
            .into_iter()
            .flat_map(|group| group.iter())
            .filter(|r| resource_matches(filter, window, r))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn batch_create_observations(
        &self,
        observations: Vec<Observation>,
    ) -> Result<Vec<Observation>> {
        let mut tables = self.tables.write();
        for observation in &observations {
            let group = observation.resource_group_name();
            if group.is_empty() {
                warn!(name = %observation.name, "observation has no resource group, not stored");
                continue;
            }
            tables
                .observations
                .entry(group.to_string())
                .or_default()
                .push(observation.clone());
        }
        Ok(observations)
    }

    async fn list_observations(
        &self,
        filter: &StorageFilter,
    ) -> Result<Vec<Observation>> {
        let window = time_window(filter)?;
        let tables = self.tables.read();
        let mut result: Vec<Observation> =
            selected_groups(&tables.observations, filter)
                .into_iter()
                .flat_map(|group| group.iter())
                .filter(|o| observation_matches(filter, window, o))
                .cloned()
                .collect();
        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn add_operation_log(&self, ops: Vec<Operation>) -> Result<()> {
        self.tables.write().pending_ops.extend(ops);
        Ok(())
    }

    async fn flush_ops_log(&self) -> Result<()> {
        let mut tables = self.tables.write();
        let pending = std::mem::take(&mut tables.pending_ops);
        tables.operations.extend(pending);
        Ok(())
    }

    async fn list_operations(&self, filter: &StorageFilter) -> Result<Vec<Operation>> {
        let window = time_window(filter)?;
        let tables = self.tables.read();
        let mut result: Vec<Operation> = tables
            .operations
            .iter()
            .filter(|op| {
                filter
                    .resource_group_names
                    .as_ref()
                    .is_none_or(|groups| groups.contains(&op.resource_group))
            })
            .filter(|op| filter.operation_id.as_ref().is_none_or(|id| *id == op.id))
            .filter(|op| within(window, Some(op.status_time)))
            .cloned()
            .collect();
        result.sort_by_key(|op| op.status_time);
        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}
