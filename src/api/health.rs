use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, info};

use crate::health::{HealthChecker, HealthState, HealthStatus};

pub fn routes(checker: HealthChecker) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(checker)
}

async fn health(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = checker.check_health().await;

    // Degraded still serves callbacks and status reads
    if health_status.status == HealthState::Unhealthy {
        error!("Health check failed - service unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let result = health(state).await;
    if result.is_ok() {
        info!("Readiness check passed");
    }
    result
}

/// Liveness probe - the process is up and serving
async fn liveness() -> &'static str {
    "OK"
}
