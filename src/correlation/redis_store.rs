//! Redis-backed correlation store
//!
//! Outcomes are written with `SET .. EX ttl`, so Redis expires them on its own
//! and several server instances behind a load balancer see the same callbacks.

use super::error::{StoreError, StoreResult};
use super::keys::OutcomeKey;
use super::CorrelationStore;
use crate::payments::types::PaymentOutcome;
use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::{error, info, warn};

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_idle: u32,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
    /// Idle timeout before closing connection
    pub idle_timeout: Duration,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
            min_idle: 2,
            connection_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Initialize the Redis connection pool
pub async fn init_redis_pool(config: RedisPoolConfig) -> StoreResult<RedisPool> {
    info!(
        "Initializing Redis pool: max_connections={}, redis_url={}",
        config.max_connections, config.redis_url
    );

    let manager = RedisConnectionManager::new(config.redis_url.as_str()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        StoreError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(config.min_idle)
        .connection_timeout(config.connection_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .test_on_check_out(false)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            StoreError::ConnectionError(e.to_string())
        })?;

    // Callbacks keep being acknowledged while Redis is down, so a failed
    // first ping is not fatal.
    if let Err(e) = ping(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    info!("Redis pool initialized successfully");
    Ok(pool)
}

async fn ping(pool: &RedisPool) -> StoreResult<()> {
    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(())
}

#[derive(Clone)]
pub struct RedisCorrelationStore {
    pool: RedisPool,
    ttl: Duration,
}

impl RedisCorrelationStore {
    pub fn new(pool: RedisPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub async fn connect(config: RedisPoolConfig, ttl: Duration) -> StoreResult<Self> {
        let pool = init_redis_pool(config).await?;
        Ok(Self::new(pool, ttl))
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

fn encode(outcome: &PaymentOutcome) -> StoreResult<String> {
    Ok(serde_json::to_string(outcome)?)
}

fn decode(raw: &str) -> StoreResult<PaymentOutcome> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl CorrelationStore for RedisCorrelationStore {
    async fn put(&self, correlation_id: &str, outcome: PaymentOutcome) -> StoreResult<()> {
        let key = OutcomeKey::new(correlation_id)?;
        let payload = encode(&outcome)?;

        let mut conn = self.pool.get().await?;
        let reply: String = redis::cmd("SET")
            .arg(key.to_string())
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut *conn)
            .await?;
        if reply != "OK" {
            return Err(StoreError::OperationError(format!(
                "unexpected SET reply: {}",
                reply
            )));
        }
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> StoreResult<Option<PaymentOutcome>> {
        let key = match OutcomeKey::new(correlation_id) {
            Ok(key) => key,
            // An id that could never have been written cannot be present.
            Err(StoreError::KeyError(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut conn = self.pool.get().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut *conn)
            .await?;

        match raw {
            Some(json) => Ok(Some(decode(&json)?)),
            None => Ok(None),
        }
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }

    async fn health_check(&self) -> StoreResult<()> {
        ping(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
