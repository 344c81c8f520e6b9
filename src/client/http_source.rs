use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

use super::poller::{PollError, StatusSource};
use crate::payments::types::PaymentStatusView;

pub const STATUS_PATH: &str = "/api/mpesa/status";

/// Reads payment status from a running PayFlow backend over HTTP.
#[derive(Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    status_url: Url,
}

impl HttpStatusSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PollError> {
        let status_url = Url::parse(base_url)
            .and_then(|base| base.join(STATUS_PATH))
            .map_err(|e| PollError::Transport(format!("invalid base url {}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Transport(e.to_string()))?;

        Ok(Self { client, status_url })
    }

    pub fn status_url(&self) -> &Url {
        &self.status_url
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_status(&self, checkout_request_id: &str) -> Result<PaymentStatusView, PollError> {
        let url = Url::parse_with_params(
            self.status_url.as_str(),
            &[("checkoutRequestId", checkout_request_id)],
        )
        .map_err(|e| PollError::Transport(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(PollError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PollError::Decode(e.to_string()))
    }
}
