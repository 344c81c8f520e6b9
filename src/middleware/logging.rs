//! Request tracing middleware
//!
//! Every request gets an `x-request-id` (generated here unless the caller sent
//! one) and one structured log line when the response goes out.

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Generates a UUID v4 request id for requests that arrive without one.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %uri.path(),
        request_id = %request_id,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if status.is_server_error() {
            error!(status = status.as_u16(), latency_ms, "request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), latency_ms, "request rejected");
        } else {
            info!(status = status.as_u16(), latency_ms, "request completed");
        }
    });

    response
}
