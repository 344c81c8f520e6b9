use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::correlation::CorrelationStore;

/// Periodically drops expired payment outcomes from the correlation store.
pub struct OutcomeExpiryWorker {
    store: Arc<dyn CorrelationStore>,
    sweep_interval: Duration,
}

impl OutcomeExpiryWorker {
    pub fn new(store: Arc<dyn CorrelationStore>, sweep_interval: Duration) -> Self {
        Self {
            store,
            sweep_interval,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            backend = self.store.backend(),
            "outcome expiry worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("outcome expiry worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.sweep_interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&self) {
        match self.store.purge_expired().await {
            Ok(0) => debug!("no expired outcomes"),
            Ok(removed) => info!(removed, "expired payment outcomes purged"),
            Err(e) => error!(error = %e, "failed to purge expired outcomes"),
        }
    }
}
