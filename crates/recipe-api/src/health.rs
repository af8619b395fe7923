use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: String,
}

/// Liveness check; never touches the database.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = ReadinessResponse),
        (status = 503, description = "Database unavailable", body = ReadinessResponse)
    )
)]
pub async fn ready(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let (status, database) = match state.db(|store| store.ping()).await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };
    let label = if status.is_success() { "ready" } else { "not_ready" };
    (
        status,
        Json(ReadinessResponse {
            status: label.to_string(),
            database: database.to_string(),
        }),
    )
}
