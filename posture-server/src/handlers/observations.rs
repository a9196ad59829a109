use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

use posture_model::{Observation, ResourceGroupObservations};

use crate::infra::{app_state::AppState, errors::AppResult};

/// Lists recent observations. Groups come from repeated `group` parameters.
pub async fn list_observations_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Vec<ResourceGroupObservations>>> {
    let groups: Vec<String> = params
        .into_iter()
        .filter(|(key, value)| key == "group" && !value.is_empty())
        .map(|(_, value)| value)
        .collect();
    let observations = state.service.list_observations(&groups).await?;
    Ok(Json(observations))
}

pub async fn create_observation_handler(
    State(state): State<AppState>,
    Json(observation): Json<Observation>,
) -> AppResult<(StatusCode, Json<Observation>)> {
    let created = state.service.create_observation(observation).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
