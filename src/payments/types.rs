use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Gateway data fields forwarded verbatim into [`PaymentOutcome::metadata`].
pub const FORWARDED_METADATA_FIELDS: [&str; 6] = [
    "phone_number",
    "amount",
    "transaction_code",
    "service_fee",
    "is_deposit",
    "type",
];

pub type PaymentMetadata = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Maps a gateway status string onto the internal status. Anything the
    /// gateway sends that is not a known terminal value stays pending.
    pub fn from_gateway(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            "cancelled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Coarse success flag: 0 for completed, 1 for everything else.
    pub fn result_code(&self) -> i32 {
        match self {
            PaymentStatus::Completed => 0,
            _ => 1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Payment pending",
            PaymentStatus::Completed => "Payment successful",
            PaymentStatus::Failed => "Payment failed",
            PaymentStatus::Cancelled => "Payment cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known state of one payment attempt, as recorded from a gateway callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOutcome {
    pub correlation_id: String,
    pub status: PaymentStatus,
    pub result_code: i32,
    pub result_description: String,
    pub metadata: Option<PaymentMetadata>,
    pub observed_at: DateTime<Utc>,
}

impl PaymentOutcome {
    pub fn from_status(
        correlation_id: impl Into<String>,
        status: PaymentStatus,
        metadata: Option<PaymentMetadata>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status,
            result_code: status.result_code(),
            result_description: status.description().to_string(),
            metadata,
            observed_at,
        }
    }
}

/// Inbound STK push request after it has been read off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushRequest {
    pub phone_number: String,
    pub amount: String,
    pub account_reference: Option<String>,
    pub transaction_desc: Option<String>,
}

/// Gateway accepted the push; the payer now has a prompt on their phone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StkPushAccepted {
    pub correlation_id: String,
    pub gateway_message: Option<String>,
    pub response_code: u16,
}

impl StkPushAccepted {
    pub fn description(&self) -> String {
        self.gateway_message
            .clone()
            .unwrap_or_else(|| "STK push sent successfully".to_string())
    }

    pub fn customer_message(&self) -> String {
        self.gateway_message.clone().unwrap_or_else(|| {
            "STK push sent successfully. Check your phone for the prompt.".to_string()
        })
    }
}

/// Body of the status endpoint and the shape the client poller decodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PaymentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub const AWAITING_CONFIRMATION_MESSAGE: &str = "Waiting for payment confirmation...";

impl PaymentStatusView {
    pub fn awaiting_confirmation() -> Self {
        Self {
            status: PaymentStatus::Pending,
            result_code: None,
            result_desc: None,
            data: None,
            timestamp: None,
            message: Some(AWAITING_CONFIRMATION_MESSAGE.to_string()),
        }
    }
}

impl From<PaymentOutcome> for PaymentStatusView {
    fn from(outcome: PaymentOutcome) -> Self {
        Self {
            status: outcome.status,
            result_code: Some(outcome.result_code),
            result_desc: Some(outcome.result_description),
            data: outcome.metadata,
            timestamp: Some(outcome.observed_at),
            message: None,
        }
    }
}

/// Callback body pushed by the gateway: `{event, data: {...}}`. `event` is
/// only logged, so any JSON shape is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(default)]
    pub event: Option<JsonValue>,
    #[serde(default)]
    pub data: Option<JsonValue>,
}

/// Reads an identifier that the gateway may send either as a string or a number.
pub fn identifier_from(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_status_table_is_fixed() {
        let cases = [
            ("completed", PaymentStatus::Completed, 0),
            ("failed", PaymentStatus::Failed, 1),
            ("cancelled", PaymentStatus::Cancelled, 1),
            ("processing", PaymentStatus::Pending, 1),
            ("", PaymentStatus::Pending, 1),
        ];
        for (raw, expected, code) in cases {
            let status = PaymentStatus::from_gateway(raw);
            assert_eq!(status, expected, "status for {:?}", raw);
            assert_eq!(status.result_code(), code, "result code for {:?}", raw);
        }
    }

    #[test]
    fn test_status_view_from_outcome_uses_camel_case_fields() {
        let outcome = PaymentOutcome::from_status(
            "abc123",
            PaymentStatus::Completed,
            None,
            Utc::now(),
        );
        let json = serde_json::to_value(PaymentStatusView::from(outcome))
            .expect("serialization should succeed");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["resultCode"], 0);
        assert_eq!(json["resultDesc"], "Payment successful");
        assert!(json["timestamp"].is_string());
        assert!(json.get("data").is_none());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_awaiting_confirmation_view_is_pending_without_result() {
        let json = serde_json::to_value(PaymentStatusView::awaiting_confirmation())
            .expect("serialization should succeed");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["message"], AWAITING_CONFIRMATION_MESSAGE);
        assert!(json.get("resultCode").is_none());
    }

    #[test]
    fn test_identifiers_accept_strings_and_numbers() {
        assert_eq!(
            identifier_from(Some(&serde_json::json!("tx_1"))),
            Some("tx_1".to_string())
        );
        assert_eq!(
            identifier_from(Some(&serde_json::json!(9001))),
            Some("9001".to_string())
        );
        assert_eq!(identifier_from(Some(&serde_json::json!("  "))), None);
        assert_eq!(identifier_from(Some(&serde_json::json!(null))), None);
        assert_eq!(identifier_from(None), None);
    }
}
