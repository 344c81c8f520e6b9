use std::sync::Arc;
use tracing::debug;

use crate::correlation::{CorrelationStore, StoreResult};
use crate::payments::types::PaymentStatusView;

/// Read side of the correlation store. Both status routes go through here.
pub struct PaymentStatusService {
    store: Arc<dyn CorrelationStore>,
}

impl PaymentStatusService {
    pub fn new(store: Arc<dyn CorrelationStore>) -> Self {
        Self { store }
    }

    /// Returns the recorded outcome, or a pending placeholder when no callback
    /// has arrived yet. Never writes.
    pub async fn lookup(&self, checkout_request_id: &str) -> StoreResult<PaymentStatusView> {
        match self.store.get(checkout_request_id).await? {
            Some(outcome) => {
                debug!(
                    checkout_request_id = %checkout_request_id,
                    status = %outcome.status,
                    "Payment outcome found"
                );
                Ok(PaymentStatusView::from(outcome))
            }
            None => Ok(PaymentStatusView::awaiting_confirmation()),
        }
    }
}
