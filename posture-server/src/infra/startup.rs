use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use posture_core::{
    Collaborators, PostureService, collector::Inventory,
    pipeline::ScheduledRunner,
};

use crate::infra::{app_state::AppState, config::Config};

/// Loads the configured inventory and wires the process-local collaborators.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let inventory = match &config.server.inventory {
        Some(path) => {
            let inventory = Inventory::load(path).with_context(|| {
                format!("failed to load inventory {}", path.display())
            })?;
            info!(
                path = %path.display(),
                resources = inventory.resources.len(),
                "inventory loaded"
            );
            inventory
        }
        None => Inventory::default(),
    };

    let parts =
        Collaborators::in_memory(inventory, config.server.owned_groups.clone());
    build_state_with(config, parts)
}

/// Builds the application state over caller-supplied collaborators.
pub fn build_state_with(
    config: Config,
    parts: Collaborators,
) -> anyhow::Result<AppState> {
    let service = PostureService::new(&config.posture, parts)
        .context("failed to initialise posture service")?;
    Ok(AppState {
        service,
        config: Arc::new(config),
    })
}

/// Starts the periodic full run when automated scans are enabled.
pub fn spawn_scheduler(
    state: &AppState,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let pipeline = &state.config.posture.pipeline;
    if !pipeline.run_automated_scans {
        info!("automated scans disabled");
        return None;
    }
    let runner = ScheduledRunner::new(
        state.service.orchestrator().clone(),
        pipeline.collect_and_scan_interval,
        cancel,
    );
    Some(runner.spawn())
}
