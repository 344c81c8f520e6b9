use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Payment declined: {message}")]
    PaymentDeclinedError {
        message: String,
        provider_code: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Invalid provider response: {message}")]
    InvalidResponseError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: &str) -> Self {
        PaymentError::ValidationError {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::PaymentDeclinedError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::InvalidResponseError { .. } => false,
            PaymentError::ConfigurationError { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::PaymentDeclinedError { .. } => 400,
            PaymentError::NetworkError { .. } => 502,
            PaymentError::InvalidResponseError { .. } => 502,
            PaymentError::ConfigurationError { .. } => 500,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::PaymentDeclinedError { message, .. } => message.clone(),
            PaymentError::NetworkError { .. } => {
                "Failed to connect to PayFlow API. Check your network and API credentials."
                    .to_string()
            }
            PaymentError::InvalidResponseError { .. } => {
                "Invalid response from PayFlow API. Response was not JSON.".to_string()
            }
            PaymentError::ConfigurationError { .. } => "Missing PayFlow configuration".to_string(),
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, InfrastructureError, ValidationError};

        let kind = match &err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.clone().unwrap_or_else(|| "request".to_string()),
                    reason: message.clone(),
                })
            }
            PaymentError::PaymentDeclinedError { message, .. } => {
                AppErrorKind::External(ExternalError::Rejected {
                    service: "payflow".to_string(),
                    message: message.clone(),
                })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::Unavailable {
                    service: "payflow".to_string(),
                    message: message.clone(),
                })
            }
            PaymentError::InvalidResponseError { message } => {
                AppErrorKind::External(ExternalError::Protocol {
                    service: "payflow".to_string(),
                    message: message.clone(),
                })
            }
            PaymentError::ConfigurationError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration {
                    message: message.clone(),
                })
            }
        };

        AppError::new(kind)
    }
}
