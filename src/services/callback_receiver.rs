use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::correlation::{CorrelationStore, StoreError};
use crate::payments::types::{
    identifier_from, CallbackEnvelope, PaymentMetadata, PaymentOutcome, PaymentStatus,
    FORWARDED_METADATA_FIELDS,
};

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Malformed callback payload: {0}")]
    MalformedPayload(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// What happened to an acknowledged callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackDisposition {
    Recorded(PaymentOutcome),
    /// Well-formed but carried no transaction id; nothing to correlate.
    Ignored,
}

/// Records gateway-pushed payment outcomes into the correlation store.
pub struct CallbackReceiver {
    store: Arc<dyn CorrelationStore>,
}

impl CallbackReceiver {
    pub fn new(store: Arc<dyn CorrelationStore>) -> Self {
        Self { store }
    }

    pub async fn receive(&self, body: &[u8]) -> Result<CallbackDisposition, CallbackError> {
        let raw: JsonValue = serde_json::from_slice(body)
            .map_err(|e| CallbackError::MalformedPayload(e.to_string()))?;
        if !raw.is_object() {
            return Err(CallbackError::MalformedPayload(
                "payload is not a JSON object".to_string(),
            ));
        }
        let envelope: CallbackEnvelope = serde_json::from_value(raw)
            .map_err(|e| CallbackError::MalformedPayload(e.to_string()))?;

        let data = envelope.data.unwrap_or(JsonValue::Null);
        let transaction_id = match identifier_from(data.get("transaction_id")) {
            Some(id) => id,
            None => {
                warn!(event = ?envelope.event, "Callback without transaction_id, ignoring");
                return Ok(CallbackDisposition::Ignored);
            }
        };

        let status = data
            .get("status")
            .and_then(JsonValue::as_str)
            .map(PaymentStatus::from_gateway)
            .unwrap_or(PaymentStatus::Pending);

        let outcome =
            PaymentOutcome::from_status(&transaction_id, status, forwarded_metadata(&data), Utc::now());

        self.store.put(&transaction_id, outcome.clone()).await?;

        info!(
            checkout_request_id = %transaction_id,
            status = %status,
            event = ?envelope.event,
            "Payment callback recorded"
        );
        Ok(CallbackDisposition::Recorded(outcome))
    }
}

/// Copies the gateway detail fields that are present and non-null.
fn forwarded_metadata(data: &JsonValue) -> Option<PaymentMetadata> {
    let metadata: PaymentMetadata = FORWARDED_METADATA_FIELDS
        .iter()
        .filter_map(|field| match data.get(*field) {
            Some(JsonValue::Null) | None => None,
            Some(value) => Some((field.to_string(), value.clone())),
        })
        .collect();

    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}
