use std::fmt;
use std::sync::Arc;

use posture_model::{
    CollectAndScanResponse, CollectId, Observation, OperationKind, Resource,
    ScanId, ScanType, StatusResponse, StorageFilter,
};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::fanout::NotificationFanout;
use crate::collector::Collector;
use crate::engine::RuleEngine;
use crate::error::Result;
use crate::state::{ClaimGuard, RequestStateManager};
use crate::storage::Storage;

/// Observation batch handed from the pipeline to the fan-out task. `None`
/// marks a phase that produced nothing to report.
type Batch = Option<Vec<Observation>>;

/// Runs collect-and-scan cycles in the background.
///
/// Every accepted run is detached from its caller: it keeps going after the
/// caller returns and only the run itself ends its claims. A run sends two
/// batches, the collect batch then the scan batch, over a channel drained
/// by a separate fan-out task.
#[derive(Clone)]
pub struct ScanOrchestrator {
    state: Arc<RequestStateManager>,
    collector: Arc<dyn Collector>,
    engine: Arc<dyn RuleEngine>,
    storage: Arc<dyn Storage>,
    fanout: Arc<NotificationFanout>,
    tasks: TaskTracker,
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("state", &self.state)
            .field("in_flight_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    /// Orchestrator over the given collaborators.
    pub fn new(
        state: Arc<RequestStateManager>,
        collector: Arc<dyn Collector>,
        engine: Arc<dyn RuleEngine>,
        storage: Arc<dyn Storage>,
        fanout: Arc<NotificationFanout>,
    ) -> Self {
        Self {
            state,
            collector,
            engine,
            storage,
            fanout,
            tasks: TaskTracker::new(),
        }
    }

    /// Request state shared by every run.
    pub fn state(&self) -> &Arc<RequestStateManager> {
        &self.state
    }

    /// Starts a run and returns its ids without waiting for it.
    ///
    /// `Full` replaces `groups` with every group the collector knows;
    /// `Partial` trusts `groups` as already authorized.
    pub async fn collect_and_scan(
        &self,
        groups: Vec<String>,
        scan_type: ScanType,
    ) -> Result<CollectAndScanResponse> {
        let collect_id = CollectId::new();
        let scan_id = ScanId::new();

        let groups = match scan_type {
            ScanType::Full => self.collector.list_resource_group_names().await?,
            ScanType::Partial => groups,
        };

        info!(
            collect_id = %collect_id,
            scan_id = %scan_id,
            scan_type = %scan_type,
            groups = groups.len(),
            "collect and scan accepted"
        );

        let span = info_span!("collect_and_scan", collect_id = %collect_id, scan_id = %scan_id);
        let this = self.clone();
        let (cid, sid) = (collect_id.clone(), scan_id.clone());
        self.tasks
            .spawn(async move { this.run(cid, sid, groups).await }.instrument(span));

        Ok(CollectAndScanResponse {
            collect_id,
            scan_id,
        })
    }

    /// Full run over every known resource group.
    pub async fn collect_and_scan_all(&self) -> Result<CollectAndScanResponse> {
        self.collect_and_scan(Vec::new(), ScanType::Full).await
    }

    /// Current status of a collect and scan pair.
    pub fn get_status(&self, collect_id: &CollectId, scan_id: &ScanId) -> StatusResponse {
        StatusResponse {
            collect_status: self.state.collect_state(collect_id),
            scan_status: self.state.scan_state(scan_id),
        }
    }

    /// Stops accepting tracked work and waits for in-flight runs.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    async fn run(&self, collect_id: CollectId, scan_id: ScanId, groups: Vec<String>) {
        let pre_collected = match self.pre_collect(&collect_id).await {
            Ok(resources) => resources,
            Err(err) => {
                error!(error = %err, "pre-collect failed, aborting run");
                self.state.end_collect(&collect_id, &groups);
                self.state.end_scan(&scan_id, &groups);
                return;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Batch>();
        let fanout = Arc::clone(&self.fanout);
        let drain = self.tasks.spawn(
            async move {
                while let Some(batch) = rx.recv().await {
                    match batch {
                        Some(observations) if !observations.is_empty() => {
                            fanout.dispatch(&observations).await;
                        }
                        _ => debug!("empty batch"),
                    }
                }
            }
            .in_current_span(),
        );

        let collected = self.collect(&collect_id, &groups, &pre_collected).await;
        if tx.send(collected).is_err() {
            warn!("fan-out stopped before the collect batch");
        }
        let scanned = self
            .scan(&scan_id, &collect_id, &groups, &pre_collected)
            .await;
        if tx.send(scanned).is_err() {
            warn!("fan-out stopped before the scan batch");
        }
        drop(tx);

        if let Err(err) = drain.await {
            error!(error = %err, "fan-out task failed");
        }
        info!("collect and scan finished");
    }

    async fn pre_collect(&self, collect_id: &CollectId) -> Result<Vec<Resource>> {
        let mut groups = self.collector.list_resource_groups(None).await?;
        for group in &mut groups {
            group.collection_uid = Some(collect_id.to_string());
        }
        debug!(groups = groups.len(), "pre-collected resource groups");
        Ok(groups)
    }

    async fn collect(
        &self,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> Batch {
        {
            let claim = ClaimGuard::acquire(
                Arc::clone(&self.state),
                OperationKind::Collect,
                collect_id.as_str(),
                groups,
            );
            if claim.granted().is_empty() {
                info!("every requested group is already being collected");
            } else if let Err(err) = self
                .collector
                .collect_and_store_all(collect_id, claim.granted(), pre_collected)
                .await
            {
                error!(error = %err, "collection failed");
            }
        }

        let filter = StorageFilter::new()
            .groups(groups.iter().cloned())
            .operation(collect_id.as_str());
        match self.storage.list_observations(&filter).await {
            Ok(observations) => Some(observations),
            Err(err) => {
                warn!(error = %err, "listing collected observations");
                None
            }
        }
    }

    async fn scan(
        &self,
        scan_id: &ScanId,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> Batch {
        let observations = {
            let claim = ClaimGuard::acquire(
                Arc::clone(&self.state),
                OperationKind::Scan,
                scan_id.as_str(),
                groups,
            );
            if claim.granted().is_empty() {
                warn!("every requested group is already being scanned");
                return None;
            }

            let (observations, errors) = self
                .engine
                .check_rules(scan_id, collect_id, claim.granted(), pre_collected)
                .await;
            if !errors.is_empty() {
                let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
                warn!(errors = errors.len(), detail = %joined.join("; "), "rule evaluation errors");
            }
            observations
        };

        if let Err(err) = self.storage.flush_ops_log().await {
            warn!(error = %err, "flushing operation log");
        }
        if observations.is_empty() {
            warn!("scan produced no observations");
        }
        Some(observations)
    }
}
