use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use posture_model::{
    CollectId, Observation, Operation, OperationKind, OperationStatus,
    Resource, ResourceKind, RuleInfo, ScanId, StorageFilter,
};
use tracing::{debug, info, warn};

use super::RuleEngine;
use super::risk;
use super::rules::{self, Rule};
use crate::error::{CoreError, Result};
use crate::storage::Storage;

/// Runs every registered rule concurrently against resources in storage.
pub struct LocalRuleEngine {
    rules: Vec<Arc<dyn Rule>>,
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for LocalRuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.rules.iter().map(|r| r.info().name).collect();
        f.debug_struct("LocalRuleEngine")
            .field("rules", &names)
            .finish_non_exhaustive()
    }
}

impl LocalRuleEngine {
    /// Engine running the built-in rule set.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_rules(storage, rules::builtin())
    }

    /// Engine running `rules` instead of the built-in set.
    pub fn with_rules(storage: Arc<dyn Storage>, rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::from).collect(),
            storage,
        }
    }

    async fn log_scan_status(
        &self,
        scan_id: &ScanId,
        groups: &[String],
        status: OperationStatus,
    ) {
        info!(scan_id = %scan_id, status = %status, groups = ?groups, "scan status");
        let ops = groups
            .iter()
            .map(|g| Operation::now(scan_id.as_str(), g.as_str(), OperationKind::Scan, status))
            .collect();
        if let Err(err) = self.storage.add_operation_log(ops).await {
            warn!(scan_id = %scan_id, error = %err, "log operation");
        }
    }

    /// Resources of `kinds` in `groups`, restricted per group to the
    /// collection `collect_id` when it stored anything for that group and to
    /// the most recent collection otherwise. Groups with no stored record
    /// fall back to their pre-collected skeleton.
    async fn resources_for(
        &self,
        collect_id: &CollectId,
        groups: &[String],
        kinds: &[ResourceKind],
        pre_collected: &[Resource],
    ) -> Result<Vec<Resource>> {
        let filter = StorageFilter::new()
            .groups(groups.iter().cloned())
            .kinds(kinds.iter().copied());
        let stored = self.storage.list_resources(&filter).await?;

        let mut by_group: HashMap<&str, Vec<&Resource>> = HashMap::new();
        for resource in &stored {
            by_group
                .entry(resource.resource_group_name.as_str())
                .or_default()
                .push(resource);
        }

        let mut selected = Vec::new();
        for group in groups {
            let Some(candidates) = by_group.get(group.as_str()) else {
                if kinds.contains(&ResourceKind::ResourceGroup) {
                    selected.extend(
                        pre_collected.iter().filter(|r| &r.name == group).cloned(),
                    );
                }
                continue;
            };
            let wanted = if candidates
                .iter()
                .any(|r| r.collection_uid.as_deref() == Some(collect_id.as_str()))
            {
                Some(collect_id.to_string())
            } else {
                candidates
                    .iter()
                    .max_by_key(|r| r.timestamp)
                    .and_then(|r| r.collection_uid.clone())
            };
            selected.extend(
                candidates
                    .iter()
                    .filter(|r| r.collection_uid == wanted)
                    .map(|r| (*r).clone()),
            );
        }
        Ok(selected)
    }

    async fn check_rule(
        &self,
        rule: &dyn Rule,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> (RuleInfo, Vec<Observation>, Vec<CoreError>) {
        let info = rule.info();
        let resources = match self
            .resources_for(collect_id, groups, &info.accepted_kinds, pre_collected)
            .await
        {
            Ok(resources) => resources,
            Err(err) => return (info, Vec::new(), vec![err]),
        };

        let mut observations = Vec::new();
        let mut errors = Vec::new();
        for resource in &resources {
            match rule.check(resource) {
                Ok(found) => observations.extend(found),
                Err(err) => errors.push(CoreError::RuleEngine(format!(
                    "rule {} on {}: {err}",
                    info.name, resource.name
                ))),
            }
        }
        debug!(rule = %info.name, resources = resources.len(), observations = observations.len(), "rule checked");
        (info, observations, errors)
    }
}

#[async_trait]
impl RuleEngine for LocalRuleEngine {
    async fn check_rules(
        &self,
        scan_id: &ScanId,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> (Vec<Observation>, Vec<CoreError>) {
        self.log_scan_status(scan_id, groups, OperationStatus::Started)
            .await;

        let runs = self
            .rules
            .iter()
            .map(|rule| self.check_rule(rule.as_ref(), collect_id, groups, pre_collected));
        let results = join_all(runs).await;

        let mut errors = Vec::new();
        let group_records = match self
            .resources_for(collect_id, groups, &[ResourceKind::ResourceGroup], pre_collected)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                errors.push(err);
                Vec::new()
            }
        };
        let mut hierarchy: HashMap<&str, &Resource> = pre_collected
            .iter()
            .filter(|r| r.is_resource_group())
            .map(|r| (r.name.as_str(), r))
            .collect();
        hierarchy.extend(group_records.iter().map(|r| (r.name.as_str(), r)));

        let mut observations = Vec::new();
        for (info, mut found, rule_errors) in results {
            errors.extend(rule_errors);
            for observation in &mut found {
                observation.scan_id = Some(scan_id.to_string());
                if observation.collection_id.is_none() {
                    observation.collection_id = Some(collect_id.to_string());
                }
                let (impact, reason) = risk::impact(&hierarchy, observation.resource_group_name());
                observation.impact = impact;
                observation.risk_score = risk::risk_score(impact, observation.severity);
                if let Some(reason) = reason {
                    debug!(observation = %observation.name, impact = %impact, reason = %reason, "impact from labels");
                }
            }
            if found.is_empty() {
                continue;
            }
            match self.storage.batch_create_observations(found).await {
                Ok(stored) => observations.extend(stored),
                Err(err) => errors.push(CoreError::RuleEngine(format!(
                    "storing observations for rule {}: {err}",
                    info.name
                ))),
            }
        }

        self.log_scan_status(scan_id, groups, OperationStatus::Completed)
            .await;
        (observations, errors)
    }

    fn rules(&self) -> Vec<RuleInfo> {
        self.rules.iter().map(|r| r.info()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::{Duration, Utc};
    use posture_model::{Impact, Permission, Severity};

    struct FailingRule;

    impl Rule for FailingRule {
        fn info(&self) -> RuleInfo {
            RuleInfo {
                name: "ALWAYS_FAILS".into(),
                accepted_kinds: vec![ResourceKind::ResourceGroup],
            }
        }

        fn check(&self, _resource: &Resource) -> Result<Vec<Observation>> {
            Err(CoreError::InvalidInput("broken".into()))
        }
    }

    fn collected(resource: Resource, collect: &str, age_minutes: i64) -> Resource {
        let mut resource = resource;
        resource.collection_uid = Some(collect.into());
        resource.timestamp = Some(Utc::now() - Duration::minutes(age_minutes));
        resource
    }

    #[tokio::test]
    async fn observations_are_stamped_and_stored() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .batch_create_resources(vec![collected(
                Resource::resource_group("g1")
                    .with_permission(Permission::new("roles/owner", ["user:a@org.com"]))
                    .with_label("contact1", "a_org_com"),
                "c1",
                0,
            )])
            .await
            .expect("store");
        let engine = LocalRuleEngine::new(storage.clone());

        let (obs, errs) = engine
            .check_rules(&ScanId::from("s1"), &CollectId::from("c1"), &["g1".to_string()], &[])
            .await;

        assert!(errs.is_empty());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].scan_id.as_deref(), Some("s1"));
        let stored = storage
            .list_observations(&StorageFilter::new().operation("s1"))
            .await
            .expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(storage.pending_operations().len(), 2);
    }

    #[tokio::test]
    async fn latest_collection_is_used_when_current_one_is_missing() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .batch_create_resources(vec![
                collected(Resource::resource_group("g1"), "old", 60),
                collected(Resource::resource_group("g1").with_label("contact1", "x_y_z"), "new", 5),
            ])
            .await
            .expect("store");
        let engine = LocalRuleEngine::new(storage);

        let (obs, _) = engine
            .check_rules(&ScanId::from("s"), &CollectId::from("other"), &["g1".to_string()], &[])
            .await;
        assert!(obs.iter().all(|o| o.name != rules::MissingContactLabels::NAME));
    }

    #[tokio::test]
    async fn customer_data_label_raises_impact_and_risk() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .batch_create_resources(vec![collected(
                Resource::resource_group("g1")
                    .with_permission(Permission::new("roles/owner", ["user:a@org.com"]))
                    .with_label("contact1", "a_org_com")
                    .with_label(risk::LABEL_CUSTOMER_DATA, "true"),
                "c1",
                0,
            )])
            .await
            .expect("store");
        let engine = LocalRuleEngine::new(storage);

        let (obs, errs) = engine
            .check_rules(&ScanId::from("s1"), &CollectId::from("c1"), &["g1".to_string()], &[])
            .await;

        assert!(errs.is_empty());
        let finding = obs
            .iter()
            .find(|o| o.name == rules::HumanWithOverprivilegedBasicRole::NAME)
            .expect("finding");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.impact, Impact::High);
        assert_eq!(finding.risk_score, Severity::Critical);
    }

    #[tokio::test]
    async fn unlabelled_group_keeps_severity_as_risk() {
        let storage = Arc::new(InMemoryStorage::new());
        let engine = LocalRuleEngine::with_rules(storage, vec![Box::new(rules::MissingContactLabels)]);
        let skeleton = Resource::resource_group("g1");

        let (obs, _) = engine
            .check_rules(&ScanId::from("s"), &CollectId::from("c"), &["g1".to_string()], &[skeleton])
            .await;
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].impact, Impact::Medium);
        assert_eq!(obs[0].risk_score, obs[0].severity);
    }

    #[tokio::test]
    async fn rule_errors_do_not_drop_other_results() {
        let storage = Arc::new(InMemoryStorage::new());
        let engine = LocalRuleEngine::with_rules(
            storage,
            vec![Box::new(FailingRule), Box::new(rules::MissingContactLabels)],
        );
        let skeleton = Resource::resource_group("g1");

        let (obs, errs) = engine
            .check_rules(&ScanId::from("s"), &CollectId::from("c"), &["g1".to_string()], &[skeleton])
            .await;
        assert_eq!(errs.len(), 1);
        assert_eq!(obs.len(), 1);
        assert_eq!(engine.rules().len(), 2);
    }
}
