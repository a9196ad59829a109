use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{exceptions, observations, scan},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/collect-and-scan", post(scan::collect_and_scan_handler))
        .route(
            "/collect-and-scan/all",
            post(scan::collect_and_scan_all_handler),
        )
        .route("/status", get(scan::status_handler))
        .route(
            "/observations",
            get(observations::list_observations_handler)
                .post(observations::create_observation_handler),
        )
        .route(
            "/exceptions",
            get(exceptions::list_exceptions_handler)
                .post(exceptions::create_exception_handler),
        )
        .route(
            "/exceptions/{uuid}",
            get(exceptions::get_exception_handler)
                .put(exceptions::update_exception_handler)
                .delete(exceptions::delete_exception_handler),
        )
}
