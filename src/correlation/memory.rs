use super::error::{StoreError, StoreResult};
use super::keys::OutcomeKey;
use super::CorrelationStore;
use crate::payments::types::PaymentOutcome;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct StoredOutcome {
    outcome: PaymentOutcome,
    stored_at: Instant,
}

/// Process-local correlation store. Entries disappear on restart and expire
/// after `ttl`; expired entries read as absent even before a sweep removes them.
#[derive(Clone)]
pub struct InMemoryCorrelationStore {
    entries: Arc<RwLock<HashMap<OutcomeKey, StoredOutcome>>>,
    ttl: Duration,
}

impl InMemoryCorrelationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn put(&self, correlation_id: &str, outcome: PaymentOutcome) -> StoreResult<()> {
        let key = OutcomeKey::new(correlation_id)?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            StoredOutcome {
                outcome,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> StoreResult<Option<PaymentOutcome>> {
        let key = match OutcomeKey::new(correlation_id) {
            Ok(key) => key,
            Err(StoreError::KeyError(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entries = self.entries.read().await;
        Ok(entries
            .get(&key)
            .filter(|stored| stored.stored_at.elapsed() < self.ttl)
            .map(|stored| stored.outcome.clone()))
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, stored| stored.stored_at.elapsed() < ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "purged expired outcomes");
        }
        Ok(removed)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
