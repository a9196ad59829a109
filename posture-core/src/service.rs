//! Caller-facing operations on top of the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use posture_model::{
    CollectAndScanResponse, CollectId, NotificationException, Observation, Operation,
    OperationKind, OperationStatus, Resource, ResourceGroupObservations, ResourceRef,
    RuleObservations, ScanId, ScanType, StatusResponse, StorageFilter,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::acl::{AccessChecker, StaticAccessChecker};
use crate::collector::{Collector, FixtureCollector, Inventory};
use crate::config::PostureConfig;
use crate::engine::{LocalRuleEngine, RuleEngine};
use crate::error::{CoreError, Result};
use crate::notify::{LogNotifier, NotificationService};
use crate::pipeline::{NotificationFanout, ScanOrchestrator};
use crate::state::RequestStateManager;
use crate::storage::{InMemoryStorage, Storage};

/// How far back observation listings look.
const OBSERVATION_WINDOW_DAYS: i64 = 7;

/// Latest completed scan per resource group, from the operation log.
fn latest_completed_scans(operations: &[Operation]) -> BTreeMap<String, String> {
    let mut latest: BTreeMap<String, (DateTime<Utc>, String)> = BTreeMap::new();
    for op in operations {
        if op.kind != OperationKind::Scan || op.status != OperationStatus::Completed {
            continue;
        }
        let newer = latest
            .get(&op.resource_group)
            .is_none_or(|(seen, _)| op.status_time >= *seen);
        if newer {
            latest.insert(op.resource_group.clone(), (op.status_time, op.id.clone()));
        }
    }
    latest.into_iter().map(|(group, (_, id))| (group, id)).collect()
}

/// Drops observations superseded by a later scan of the same group.
/// `completed` names the latest completed scan per group; groups missing
/// from it fall back to the newest scan seen among the observations.
/// Observations not produced by a scan are kept.
fn latest_scan_only(
    observations: Vec<Observation>,
    completed: &BTreeMap<String, String>,
) -> Vec<Observation> {
    let mut latest: BTreeMap<String, (Option<DateTime<Utc>>, String)> = BTreeMap::new();
    for observation in &observations {
        let Some(scan_id) = &observation.scan_id else {
            continue;
        };
        let group = observation.resource_group_name();
        if completed.contains_key(group) {
            continue;
        }
        let newer = latest
            .get(group)
            .is_none_or(|(seen, _)| observation.timestamp > *seen);
        if newer {
            latest.insert(group.to_string(), (observation.timestamp, scan_id.clone()));
        }
    }
    observations
        .into_iter()
        .filter(|o| match &o.scan_id {
            None => true,
            Some(scan_id) => {
                let group = o.resource_group_name();
                match completed.get(group) {
                    Some(newest) => newest == scan_id,
                    None => latest
                        .get(group)
                        .is_some_and(|(_, newest)| newest == scan_id),
                }
            }
        })
        .collect()
}

/// External systems the service runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Enumerates and snapshots cloud resources.
    pub collector: Arc<dyn Collector>,
    /// Evaluates rules.
    pub engine: Arc<dyn RuleEngine>,
    /// Keeps resources, observations and the operation log.
    pub storage: Arc<dyn Storage>,
    /// Delivers notifications.
    pub notifier: Arc<dyn NotificationService>,
    /// Authorizes callers.
    pub checker: Arc<dyn AccessChecker>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Process-local collaborators over a static inventory. An empty `owned`
    /// grants access to every inventory group.
    pub fn in_memory(inventory: Inventory, owned: Vec<String>) -> Self {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let collector: Arc<dyn Collector> =
            Arc::new(FixtureCollector::new(inventory, Arc::clone(&storage)));
        Self {
            engine: Arc::new(LocalRuleEngine::new(Arc::clone(&storage))),
            notifier: Arc::new(LogNotifier::new()),
            checker: Arc::new(StaticAccessChecker::new(owned, Arc::clone(&collector))),
            collector,
            storage,
        }
    }
}

/// Authorized entry points of the scanner.
#[derive(Clone)]
pub struct PostureService {
    orchestrator: ScanOrchestrator,
    checker: Arc<dyn AccessChecker>,
    storage: Arc<dyn Storage>,
    engine: Arc<dyn RuleEngine>,
    notifier: Arc<dyn NotificationService>,
    source_system: String,
}

impl fmt::Debug for PostureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostureService")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl PostureService {
    /// Validates `config` and wires the pipeline over `parts`.
    pub fn new(config: &PostureConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;
        let fanout = NotificationFanout::new(
            &config.notifications,
            Arc::clone(&parts.storage),
            Arc::clone(&parts.notifier),
        )?;
        let orchestrator = ScanOrchestrator::new(
            Arc::new(RequestStateManager::new()),
            parts.collector,
            Arc::clone(&parts.engine),
            Arc::clone(&parts.storage),
            Arc::new(fanout),
        );
        Ok(Self {
            orchestrator,
            checker: parts.checker,
            storage: parts.storage,
            engine: parts.engine,
            notifier: parts.notifier,
            source_system: config.notifications.source_system.clone(),
        })
    }

    /// Pipeline driving every run.
    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    /// Checks `groups` against what the caller owns. An empty request means
    /// every owned group.
    pub async fn validate_resource_group_names(
        &self,
        groups: &[String],
    ) -> Result<Vec<String>> {
        let owned = self
            .checker
            .list_resource_group_names_owned()
            .await
            .map_err(|err| CoreError::Unauthenticated(err.to_string()))?;
        if groups.is_empty() {
            return Ok(owned.into_iter().collect());
        }
        if let Some(denied) = groups.iter().find(|g| !owned.contains(*g)) {
            return Err(CoreError::AccessDenied(format!(
                "resource group {denied} is not accessible"
            )));
        }
        Ok(groups.to_vec())
    }

    /// Starts a collect and scan of `groups`, or of every owned group.
    pub async fn collect_and_scan(
        &self,
        groups: &[String],
    ) -> Result<CollectAndScanResponse> {
        let groups = self.validate_resource_group_names(groups).await?;
        self.orchestrator
            .collect_and_scan(groups, ScanType::Partial)
            .await
    }

    /// Starts a collect and scan of every known group.
    pub async fn collect_and_scan_all(&self) -> Result<CollectAndScanResponse> {
        self.orchestrator.collect_and_scan_all().await
    }

    /// Current status of a collect and scan pair.
    pub fn get_status(&self, collect_id: &CollectId, scan_id: &ScanId) -> StatusResponse {
        self.orchestrator.get_status(collect_id, scan_id)
    }

    /// Recent observations grouped by resource group, then rule. Every known
    /// rule is listed for every group, with no observations when clean.
    pub async fn list_observations(
        &self,
        groups: &[String],
    ) -> Result<Vec<ResourceGroupObservations>> {
        let groups = self.validate_resource_group_names(groups).await?;
        let filter = StorageFilter::new()
            .groups(groups.iter().cloned())
            .since(Duration::days(OBSERVATION_WINDOW_DAYS));
        let observations = self.storage.list_observations(&filter).await.map_err(|err| {
            warn!(error = %err, "list observations");
            err
        })?;
        let operations = self.storage.list_operations(&filter).await.map_err(|err| {
            warn!(error = %err, "list operations");
            err
        })?;
        let completed = latest_completed_scans(&operations);

        let rules = self.engine.rules();
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<Observation>>> = groups
            .iter()
            .map(|group| {
                let per_rule = rules
                    .iter()
                    .map(|rule| (rule.name.clone(), Vec::new()))
                    .collect();
                (group.clone(), per_rule)
            })
            .collect();
        for observation in latest_scan_only(observations, &completed) {
            grouped
                .entry(observation.resource_group_name().to_string())
                .or_default()
                .entry(observation.name.clone())
                .or_default()
                .push(observation);
        }

        Ok(grouped
            .into_iter()
            .map(|(resource_group_name, per_rule)| ResourceGroupObservations {
                resource_group_name,
                rules_observations: per_rule
                    .into_iter()
                    .map(|(rule, observations)| RuleObservations { rule, observations })
                    .collect(),
            })
            .collect())
    }

    /// Stores an externally reported observation against an existing resource.
    pub async fn create_observation(&self, mut observation: Observation) -> Result<Observation> {
        if observation.name.is_empty() {
            return Err(CoreError::InvalidInput("observation does not have a name".into()));
        }
        if observation.resource_ref.name.is_empty() {
            return Err(CoreError::InvalidInput(
                "resource to link observation with not defined".into(),
            ));
        }
        if observation.remediation.recommendation.is_empty() {
            return Err(CoreError::InvalidInput(
                "cannot create an observation without recommendation".into(),
            ));
        }

        let filter = StorageFilter::new().names([observation.resource_ref.name.as_str()]);
        let found = self.storage.list_resources(&filter).await?;
        let latest = found
            .iter()
            .max_by_key(|r| r.timestamp)
            .and_then(|r| r.collection_uid.clone());
        let current: Vec<&Resource> = found
            .iter()
            .filter(|r| r.collection_uid == latest)
            .collect();
        let [resource] = current.as_slice() else {
            return Err(CoreError::NotFound(format!(
                "found {} resources matching {}",
                current.len(),
                observation.resource_ref.name
            )));
        };

        observation.resource_ref = ResourceRef {
            name: resource.name.clone(),
            resource_group_name: resource.resource_group_name.clone(),
            uid: Some(resource.uid.clone()),
        };
        if observation.collection_id.is_none() {
            observation.collection_id = resource.collection_uid.clone();
        }
        if observation.uid.is_empty() {
            observation.uid = Uuid::now_v7().to_string();
        }
        observation.timestamp = Some(Utc::now());

        let mut stored = self
            .storage
            .batch_create_observations(vec![observation])
            .await?;
        match stored.pop() {
            Some(created) if stored.is_empty() => {
                info!(name = %created.name, resource = %created.resource_ref.name, "observation created");
                Ok(created)
            }
            _ => Err(CoreError::Storage("unexpected number of created observations".into())),
        }
    }

    /// Exception `uuid`, provided the caller owns it.
    async fn owned_exception(&self, user: &str, uuid: &str) -> Result<NotificationException> {
        let exception = self.notifier.get_exception(uuid).await?;
        if exception.user_email != user {
            warn!(uuid = %uuid, "caller does not own the notification exception");
            return Err(CoreError::Unauthenticated(format!(
                "exception {uuid} belongs to another user"
            )));
        }
        Ok(exception)
    }

    /// Caller's exception `uuid`.
    pub async fn get_exception(
        &self,
        caller: Option<&str>,
        uuid: &str,
    ) -> Result<NotificationException> {
        let user = self.checker.authenticated_user(caller).await?;
        self.owned_exception(&user, uuid).await
    }

    /// Creates an exception owned by the caller, whatever owner the request
    /// names.
    pub async fn create_exception(
        &self,
        caller: Option<&str>,
        mut exception: NotificationException,
    ) -> Result<NotificationException> {
        let user = self.checker.authenticated_user(caller).await?;
        if exception.notification_name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "exception does not name a notification".into(),
            ));
        }
        exception.user_email = user;
        exception.source_system = self.source_system.clone();
        self.notifier.create_exception(exception).await
    }

    /// Replaces the caller's exception `uuid`. Owner and source system
    /// cannot change.
    pub async fn update_exception(
        &self,
        caller: Option<&str>,
        uuid: &str,
        mut exception: NotificationException,
    ) -> Result<NotificationException> {
        let user = self.checker.authenticated_user(caller).await?;
        let existing = self.owned_exception(&user, uuid).await?;
        if exception.notification_name.trim().is_empty() {
            exception.notification_name = existing.notification_name;
        }
        exception.uuid = existing.uuid;
        exception.user_email = existing.user_email;
        exception.source_system = existing.source_system;
        self.notifier.update_exception(exception).await
    }

    /// Deletes the caller's exception `uuid`.
    pub async fn delete_exception(&self, caller: Option<&str>, uuid: &str) -> Result<()> {
        let user = self.checker.authenticated_user(caller).await?;
        self.owned_exception(&user, uuid).await?;
        self.notifier.delete_exception(uuid).await
    }

    /// One page of the caller's exceptions.
    pub async fn list_exceptions(
        &self,
        caller: Option<&str>,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Vec<NotificationException>> {
        let user = self.checker.authenticated_user(caller).await?;
        self.notifier
            .list_exceptions(&user, page_size, page_token)
            .await
    }
}
