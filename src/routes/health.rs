use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::{HealthResponse, StatsResponse},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
/// Return the current health status of the backend.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state).await)
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "health",
    responses((status = 200, description = "Registry and webhook counters", body = StatsResponse))
)]
/// Diagnostic counters for live sessions and webhook subscriptions.
pub async fn stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    Json(health_service::stats(&state).await)
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/healthcheck", get(healthcheck))
        .route("/stats", get(stats))
}
