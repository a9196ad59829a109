use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;

use posture_model::NotificationException;

use crate::infra::{app_state::AppState, errors::AppResult};

/// Header carrying the email of the authenticated caller.
pub const CALLER_HEADER: &str = "x-posture-user";

fn caller(headers: &HeaderMap) -> Option<&str> {
    headers.get(CALLER_HEADER).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListExceptionsQuery {
    #[serde(default)]
    pub page_size: usize,
    pub page_token: Option<String>,
}

pub async fn list_exceptions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListExceptionsQuery>,
) -> AppResult<Json<Vec<NotificationException>>> {
    let exceptions = state
        .service
        .list_exceptions(
            caller(&headers),
            query.page_size,
            query.page_token.as_deref(),
        )
        .await?;
    Ok(Json(exceptions))
}

pub async fn create_exception_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(exception): Json<NotificationException>,
) -> AppResult<(StatusCode, Json<NotificationException>)> {
    let created = state
        .service
        .create_exception(caller(&headers), exception)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_exception_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> AppResult<Json<NotificationException>> {
    let exception = state.service.get_exception(caller(&headers), &uuid).await?;
    Ok(Json(exception))
}

pub async fn update_exception_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(exception): Json<NotificationException>,
) -> AppResult<Json<NotificationException>> {
    let updated = state
        .service
        .update_exception(caller(&headers), &uuid, exception)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_exception_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> AppResult<StatusCode> {
    state
        .service
        .delete_exception(caller(&headers), &uuid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
