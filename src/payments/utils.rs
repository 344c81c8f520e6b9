use crate::payments::error::{PaymentError, PaymentResult};
use bigdecimal::{BigDecimal, ToPrimitive};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const MAX_PAYMENT_AMOUNT: i64 = 999_999;

/// Status and raw body of a provider response. The body is kept as text so
/// callers can tell a malformed (non-JSON) reply apart from a failed one.
#[derive(Debug, Clone)]
pub struct RawProviderResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// Sends a JSON request and returns whatever the provider answered.
    ///
    /// Only connection failures are retried: once a request has reached the
    /// provider it may already have triggered a prompt on the payer's phone.
    pub async fn post_json(
        &self,
        url: &str,
        body: &JsonValue,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<RawProviderResponse> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.post(url).timeout(self.timeout).json(body);
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.map_err(|e| PaymentError::NetworkError {
                        message: format!("failed to read provider response: {}", e),
                    })?;
                    return Ok(RawProviderResponse { status, body });
                }
                Err(e) if e.is_connect() && attempt < self.max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "provider connection failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PaymentError::NetworkError {
                        message: format!("provider request failed: {}", e),
                    })
                }
            }
        }
    }
}

/// Brings a phone number into `<country_code>XXXXXXXXX` form.
///
/// Accepts `+254712345678`, `254712345678`, `0712345678` and `712345678`
/// (spaces and dashes are ignored).
pub fn normalize_phone_number(raw: &str, country_code: &str) -> PaymentResult<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let without_plus = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let mut normalized = match without_plus.strip_prefix('0') {
        Some(rest) => format!("{}{}", country_code, rest),
        None => without_plus.to_string(),
    };
    if !normalized.starts_with(country_code) {
        normalized = format!("{}{}", country_code, normalized);
    }

    let pattern = Regex::new(&format!(r"^{}\d{{9}}$", regex::escape(country_code)))
        .map_err(|e| PaymentError::ConfigurationError {
            message: format!("invalid country code {}: {}", country_code, e),
        })?;
    if !pattern.is_match(&normalized) {
        return Err(PaymentError::validation(
            format!("Invalid phone number. Use format: +{}XXXXXXXXX", country_code),
            "phoneNumber",
        ));
    }

    Ok(normalized)
}

/// Longest amount string worth parsing; anything longer is out of range anyway.
const MAX_AMOUNT_LEN: usize = 32;

/// Parses a decimal amount and floors it to the whole units the gateway accepts.
///
/// Only plain `digits[.digits]` is accepted. Exponent notation is refused
/// before parsing, since comparing a huge exponent forces a full rescale.
pub fn whole_amount(raw: &str) -> PaymentResult<i64> {
    let trimmed = raw.trim();
    let plain_decimal = Regex::new(r"^\d+(\.\d+)?$").map_err(|e| {
        PaymentError::ConfigurationError {
            message: format!("invalid amount pattern: {}", e),
        }
    })?;
    if trimmed.len() > MAX_AMOUNT_LEN || !plain_decimal.is_match(trimmed) {
        if trimmed.starts_with('-') {
            return Err(PaymentError::validation(
                "Amount must be greater than zero",
                "amount",
            ));
        }
        return Err(PaymentError::validation(
            format!("invalid amount: {}", raw),
            "amount",
        ));
    }

    let parsed = BigDecimal::from_str(trimmed).map_err(|_| {
        PaymentError::validation(format!("invalid amount: {}", raw), "amount")
    })?;
    if parsed <= BigDecimal::from(0) {
        return Err(PaymentError::validation(
            "Amount must be greater than zero",
            "amount",
        ));
    }
    if parsed > BigDecimal::from(MAX_PAYMENT_AMOUNT) {
        return Err(PaymentError::validation(
            "Amount must be between 1 and 999,999",
            "amount",
        ));
    }

    let whole = parsed
        .with_scale(0)
        .to_i64()
        .ok_or_else(|| PaymentError::validation(format!("invalid amount: {}", raw), "amount"))?;
    if whole < 1 {
        return Err(PaymentError::validation(
            "Amount must be between 1 and 999,999",
            "amount",
        ));
    }

    Ok(whole)
}
