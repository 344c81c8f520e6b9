//! Error response formatting
//!
//! Every failed request gets the same JSON shape. `error` carries the
//! human-readable message, so browser clients that only read `error` keep
//! working; `code` is the machine-readable variant.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code
    pub code: ErrorCode,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Whether the client should retry the request
    pub retryable: bool,
}

impl ErrorResponse {
    /// Create a new error response from an AppError
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.user_message(),
            code: error.error_code(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: error.is_retryable(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, ExternalError, InfrastructureError};

    #[test]
    fn test_error_response_from_app_error() {
        let app_error = AppError::new(AppErrorKind::External(ExternalError::Rejected {
            service: "payflow".to_string(),
            message: "Insufficient float".to_string(),
        }))
        .with_request_id("req_123");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert_eq!(error_response.code, ErrorCode::PaymentRejected);
        assert_eq!(error_response.request_id, Some("req_123".to_string()));
        assert_eq!(error_response.error, "Insufficient float");
        assert!(!error_response.retryable);
    }

    #[test]
    fn test_app_error_into_response() {
        let response = AppError::missing_field("checkoutRequestId").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: "PAYFLOW_API_KEY is not set".to_string(),
            },
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_id_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_request_id_from_headers(&headers), None);

        headers.insert("x-request-id", "req_789".parse().unwrap());
        assert_eq!(
            get_request_id_from_headers(&headers),
            Some("req_789".to_string())
        );
    }
}
