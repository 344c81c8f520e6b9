//! Correlation store
//!
//! Maps a gateway correlation id (the `checkoutRequestId` clients poll with)
//! to the latest payment outcome pushed by the gateway's callback:
//! - written only by the callback receiver, read only by the status lookup
//! - last write wins; a read never creates an entry
//! - every entry expires after the configured TTL

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "cache")]
pub mod redis_store;

use crate::config::{StoreBackend, StoreConfig};
use crate::payments::types::PaymentOutcome;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCorrelationStore;

#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Unconditional upsert.
    async fn put(&self, correlation_id: &str, outcome: PaymentOutcome) -> StoreResult<()>;

    async fn get(&self, correlation_id: &str) -> StoreResult<Option<PaymentOutcome>>;

    /// Drops expired entries and returns how many were removed. Backends with
    /// native expiry return 0.
    async fn purge_expired(&self) -> StoreResult<usize>;

    async fn health_check(&self) -> StoreResult<()>;

    fn backend(&self) -> &'static str;
}

/// Builds the store selected by configuration.
pub async fn build_store(config: &StoreConfig) -> StoreResult<Arc<dyn CorrelationStore>> {
    let ttl = Duration::from_secs(config.outcome_ttl_secs);
    match config.backend {
        StoreBackend::Memory => {
            info!(ttl_secs = config.outcome_ttl_secs, "using in-memory correlation store");
            Ok(Arc::new(InMemoryCorrelationStore::new(ttl)))
        }
        #[cfg(feature = "cache")]
        StoreBackend::Redis => {
            let redis_url = config.redis_url.clone().ok_or_else(|| {
                StoreError::ConnectionError("REDIS_URL is required for the redis store".to_string())
            })?;
            info!(ttl_secs = config.outcome_ttl_secs, "using redis correlation store");
            let pool_config = redis_store::RedisPoolConfig {
                redis_url,
                ..Default::default()
            };
            let store = redis_store::RedisCorrelationStore::connect(pool_config, ttl).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "cache"))]
        StoreBackend::Redis => Err(StoreError::ConnectionError(
            "redis store requested but the `cache` feature is disabled".to_string(),
        )),
    }
}
