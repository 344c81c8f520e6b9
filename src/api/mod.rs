pub mod health;
pub mod mpesa;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};

/// Everything the HTTP layer needs.
#[derive(Clone)]
pub struct AppState {
    pub mpesa: mpesa::MpesaState,
    pub health_checker: HealthChecker,
}

/// Builds the full application router with request-id and logging layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(mpesa::routes(state.mpesa))
        .merge(health::routes(state.health_checker))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
