//! Unified error handling for the PayFlow backend
//!
//! This module provides a single error type with HTTP status mapping,
//! user-facing messages, and machine-readable error codes for clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Client errors (4xx)
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "PAYMENT_REJECTED")]
    PaymentRejected,

    // Upstream errors (502)
    #[serde(rename = "UPSTREAM_UNAVAILABLE")]
    UpstreamUnavailable,
    #[serde(rename = "UPSTREAM_PROTOCOL_ERROR")]
    UpstreamProtocolError,

    // Infrastructure errors (5xx)
    #[serde(rename = "STORE_ERROR")]
    StoreError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing or blank
    MissingField { field: String },
    /// Field present but unusable
    InvalidField { field: String, reason: String },
    /// Body could not be read as the expected JSON
    MalformedBody { reason: String },
}

/// Errors reported by or about the payment gateway
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Gateway could not be reached
    Unavailable { service: String, message: String },
    /// Gateway answered with something other than the expected JSON
    Protocol { service: String, message: String },
    /// Gateway explicitly refused the request
    Rejected { service: String, message: String },
}

/// Infrastructure-level errors (store, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Correlation store unavailable or failing
    Store { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Validation(ValidationError),
    External(ExternalError),
    Infrastructure(InfrastructureError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn malformed_body(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MalformedBody {
            reason: reason.into(),
        }))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::External(err) => match err {
                ExternalError::Unavailable { .. } => 502,
                ExternalError::Protocol { .. } => 502,
                ExternalError::Rejected { .. } => 400,
            },
            AppErrorKind::Infrastructure(_) => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::External(err) => match err {
                ExternalError::Unavailable { .. } => ErrorCode::UpstreamUnavailable,
                ExternalError::Protocol { .. } => ErrorCode::UpstreamProtocolError,
                ExternalError::Rejected { .. } => ErrorCode::PaymentRejected,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Store { .. } => ErrorCode::StoreError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => format!("{} is required", field),
                ValidationError::InvalidField { reason, .. } => reason.clone(),
                ValidationError::MalformedBody { .. } => "Request body must be valid JSON".to_string(),
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Unavailable { .. } => {
                    "Failed to connect to PayFlow API. Check your network and API credentials."
                        .to_string()
                }
                ExternalError::Protocol { .. } => {
                    "Invalid response from PayFlow API. Response was not JSON.".to_string()
                }
                ExternalError::Rejected { message, .. } => message.clone(),
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Store { .. } => "Failed to check status".to_string(),
                InfrastructureError::Configuration { .. } => {
                    "Missing PayFlow configuration".to_string()
                }
            },
        }
    }

    /// Whether the client may retry the same request
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Validation(_) => false,
            AppErrorKind::External(ExternalError::Unavailable { .. }) => true,
            AppErrorKind::External(_) => false,
            AppErrorKind::Infrastructure(InfrastructureError::Store { .. }) => true,
            AppErrorKind::Infrastructure(InfrastructureError::Configuration { .. }) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => write!(f, "missing field: {}", field),
                ValidationError::InvalidField { field, reason } => {
                    write!(f, "invalid field {}: {}", field, reason)
                }
                ValidationError::MalformedBody { reason } => {
                    write!(f, "malformed body: {}", reason)
                }
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Unavailable { service, message } => {
                    write!(f, "{} unavailable: {}", service, message)
                }
                ExternalError::Protocol { service, message } => {
                    write!(f, "{} protocol error: {}", service, message)
                }
                ExternalError::Rejected { service, message } => {
                    write!(f, "{} rejected request: {}", service, message)
                }
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Store { message } => write!(f, "store error: {}", message),
                InfrastructureError::Configuration { message } => {
                    write!(f, "configuration error: {}", message)
                }
            },
        }
    }
}

impl std::error::Error for AppError {}
