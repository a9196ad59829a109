use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use posture_model::{
    CollectAndScanRequest, CollectAndScanResponse, CollectId, ScanId,
    StatusResponse,
};

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub collect_id: String,
    pub scan_id: String,
}

/// Starts a partial run over the requested groups, or every owned group when
/// the list is empty.
pub async fn collect_and_scan_handler(
    State(state): State<AppState>,
    Json(request): Json<CollectAndScanRequest>,
) -> AppResult<Json<CollectAndScanResponse>> {
    let response = state
        .service
        .collect_and_scan(&request.resource_group_names)
        .await?;
    info!(
        collect_id = %response.collect_id,
        scan_id = %response.scan_id,
        groups = request.resource_group_names.len(),
        "collect and scan requested"
    );
    Ok(Json(response))
}

pub async fn collect_and_scan_all_handler(
    State(state): State<AppState>,
) -> AppResult<Json<CollectAndScanResponse>> {
    let response = state.service.collect_and_scan_all().await?;
    info!(
        collect_id = %response.collect_id,
        scan_id = %response.scan_id,
        "full collect and scan requested"
    );
    Ok(Json(response))
}

pub async fn status_handler(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let collect_id = CollectId::from(query.collect_id);
    let scan_id = ScanId::from(query.scan_id);
    Json(state.service.get_status(&collect_id, &scan_id))
}
