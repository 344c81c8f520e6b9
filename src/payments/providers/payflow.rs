use crate::logging::mask_phone_number;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{identifier_from, StkPushAccepted, StkPushRequest};
use crate::payments::utils::{normalize_phone_number, whole_amount, PaymentHttpClient};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://payflow.top";
pub const STK_PUSH_PATH: &str = "/api/v2/stkpush.php";

#[derive(Clone)]
pub struct PayflowConfig {
    pub api_key: String,
    pub api_secret: String,
    pub payment_account_id: i64,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub country_code: String,
    pub default_reference: String,
    pub default_description: String,
}

impl Default for PayflowConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            payment_account_id: 0,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 1,
            country_code: "254".to_string(),
            default_reference: "PAYFLOW".to_string(),
            default_description: "Payment for goods and services".to_string(),
        }
    }
}

impl PayflowConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key = std::env::var("PAYFLOW_API_KEY").unwrap_or_default();
        let api_secret = std::env::var("PAYFLOW_API_SECRET").unwrap_or_default();
        let account_raw = std::env::var("PAYFLOW_PAYMENT_ACCOUNT_ID").unwrap_or_default();
        if api_key.is_empty() || api_secret.is_empty() || account_raw.is_empty() {
            return Err(PaymentError::ConfigurationError {
                message:
                    "PAYFLOW_API_KEY, PAYFLOW_API_SECRET and PAYFLOW_PAYMENT_ACCOUNT_ID are required"
                        .to_string(),
            });
        }
        let payment_account_id =
            account_raw
                .trim()
                .parse::<i64>()
                .map_err(|_| PaymentError::ConfigurationError {
                    message: "PAYFLOW_PAYMENT_ACCOUNT_ID must be an integer".to_string(),
                })?;

        let defaults = Self::default();
        Ok(Self {
            api_key,
            api_secret,
            payment_account_id,
            base_url: std::env::var("PAYFLOW_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: std::env::var("PAYFLOW_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("PAYFLOW_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
            country_code: std::env::var("PAYFLOW_COUNTRY_CODE").unwrap_or(defaults.country_code),
            default_reference: std::env::var("PAYFLOW_DEFAULT_REFERENCE")
                .unwrap_or(defaults.default_reference),
            default_description: std::env::var("PAYFLOW_DEFAULT_DESCRIPTION")
                .unwrap_or(defaults.default_description),
        })
    }
}

// Credentials never reach the logs.
impl fmt::Debug for PayflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayflowConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("api_secret", &"***")
            .field("payment_account_id", &self.payment_account_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("country_code", &self.country_code)
            .finish()
    }
}

fn mask_secret(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{}***", prefix)
}

pub struct PayflowGateway {
    config: PayflowConfig,
    http: PaymentHttpClient,
}

impl PayflowGateway {
    pub fn new(config: PayflowConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PayflowConfig::from_env()?)
    }

    pub fn config(&self) -> &PayflowConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), STK_PUSH_PATH)
    }

    fn non_blank(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    /// Turns a parsed gateway reply into an accepted push or a business failure.
    pub fn interpret_response(
        status: StatusCode,
        body: &JsonValue,
    ) -> PaymentResult<StkPushAccepted> {
        let succeeded = match body.get("success") {
            Some(JsonValue::Bool(flag)) => *flag,
            Some(JsonValue::String(flag)) => flag == "true",
            _ => false,
        };
        let gateway_message = body
            .get("message")
            .and_then(|v| v.as_str())
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);

        if !succeeded {
            return Err(PaymentError::PaymentDeclinedError {
                message: gateway_message
                    .unwrap_or_else(|| "PayFlow API request failed".to_string()),
                provider_code: Some(status.as_u16().to_string()),
            });
        }

        let correlation_id = identifier_from(body.get("data").and_then(|d| d.get("transaction_id")))
            .or_else(|| identifier_from(body.get("transaction_id")))
            .or_else(|| identifier_from(body.get("id")))
            .unwrap_or_else(|| {
                let synthesized = format!("payment_{}", chrono::Utc::now().timestamp_millis());
                warn!(
                    checkout_request_id = %synthesized,
                    "gateway response carried no transaction id, synthesized one"
                );
                synthesized
            });

        Ok(StkPushAccepted {
            correlation_id,
            gateway_message,
            response_code: status.as_u16(),
        })
    }
}

#[async_trait]
impl PaymentGateway for PayflowGateway {
    async fn initiate_stk_push(&self, request: StkPushRequest) -> PaymentResult<StkPushAccepted> {
        if request.phone_number.trim().is_empty() || request.amount.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "Phone number and amount are required".to_string(),
                field: None,
            });
        }
        let phone = normalize_phone_number(&request.phone_number, &self.config.country_code)?;
        let amount = whole_amount(&request.amount)?;
        let reference = Self::non_blank(request.account_reference)
            .unwrap_or_else(|| self.config.default_reference.clone());
        let description = Self::non_blank(request.transaction_desc)
            .unwrap_or_else(|| self.config.default_description.clone());

        let payload = serde_json::json!({
            "payment_account_id": self.config.payment_account_id,
            "phone": phone,
            "amount": amount,
            "reference": reference,
            "description": description,
        });

        info!(
            phone = %mask_phone_number(&phone),
            amount = amount,
            reference = %reference,
            "initiating payflow stk push"
        );

        let raw = self
            .http
            .post_json(
                &self.endpoint(),
                &payload,
                &[
                    ("X-API-Key", self.config.api_key.as_str()),
                    ("X-API-Secret", self.config.api_secret.as_str()),
                ],
            )
            .await
            .map_err(|e| {
                error!(error = %e, "failed to reach payflow");
                e
            })?;

        let parsed: JsonValue = serde_json::from_str(&raw.body).map_err(|e| {
            let preview: String = raw.body.chars().take(500).collect();
            error!(status = %raw.status, body = %preview, "payflow response was not JSON");
            PaymentError::InvalidResponseError {
                message: format!("HTTP {}: {}", raw.status, e),
            }
        })?;

        match Self::interpret_response(raw.status, &parsed) {
            Ok(accepted) => {
                info!(
                    checkout_request_id = %accepted.correlation_id,
                    response_code = accepted.response_code,
                    "payflow stk push accepted"
                );
                Ok(accepted)
            }
            Err(e) => {
                warn!(status = %raw.status, error = %e, "payflow rejected stk push");
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "payflow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_correlation_id_prefers_nested_transaction_id() {
        let body = json!({
            "success": true,
            "message": "queued",
            "transaction_id": "outer",
            "id": 7,
            "data": {"transaction_id": "inner"}
        });
        let accepted = PayflowGateway::interpret_response(StatusCode::OK, &body).unwrap();
        assert_eq!(accepted.correlation_id, "inner");
        assert_eq!(accepted.gateway_message.as_deref(), Some("queued"));
        assert_eq!(accepted.response_code, 200);
    }

    #[test]
    fn test_correlation_id_falls_back_through_fields() {
        let body = json!({"success": "true", "transaction_id": "outer", "id": 7});
        let accepted = PayflowGateway::interpret_response(StatusCode::OK, &body).unwrap();
        assert_eq!(accepted.correlation_id, "outer");

        let body = json!({"success": true, "id": 7});
        let accepted = PayflowGateway::interpret_response(StatusCode::OK, &body).unwrap();
        assert_eq!(accepted.correlation_id, "7");
    }

    #[test]
    fn test_correlation_id_is_synthesized_when_missing() {
        let body = json!({"success": true});
        let accepted = PayflowGateway::interpret_response(StatusCode::OK, &body).unwrap();
        assert!(accepted.correlation_id.starts_with("payment_"));
        assert_eq!(accepted.description(), "STK push sent successfully");
    }

    #[test]
    fn test_explicit_failure_flag_is_a_business_failure() {
        let body = json!({"success": false, "message": "Insufficient float"});
        let err = PayflowGateway::interpret_response(StatusCode::OK, &body).unwrap_err();
        match err {
            PaymentError::PaymentDeclinedError { message, .. } => {
                assert_eq!(message, "Insufficient float")
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = PayflowGateway::interpret_response(StatusCode::BAD_REQUEST, &json!({}))
            .unwrap_err();
        assert_eq!(err.user_message(), "PayFlow API request failed");
    }

    #[test]
    fn test_debug_output_masks_credentials() {
        let config = PayflowConfig {
            api_key: "pk_live_abcdef".to_string(),
            api_secret: "sk_live_secret".to_string(),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk_live_secret"));
        assert!(!rendered.contains("pk_live_abcdef"));
        assert!(rendered.contains("pk_l***"));
    }
}
