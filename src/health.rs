//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::correlation::{CorrelationStore, StoreResult};

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<dyn CorrelationStore>,
    gateway_configured: bool,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn CorrelationStore>, gateway_configured: bool) -> Self {
        Self {
            store,
            gateway_configured,
        }
    }

    /// A failing store makes the service unhealthy; missing gateway
    /// credentials only degrade it, since callbacks and status reads still work.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;
        let mut degraded = false;

        let store_key = format!("correlation_store.{}", self.store.backend());
        match timeout(Duration::from_secs(5), check_store_health(self.store.as_ref())).await {
            Ok(Ok(response_time)) => {
                health_status
                    .checks
                    .insert(store_key, ComponentHealth::up(Some(response_time)));
                info!("Correlation store health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert(store_key, ComponentHealth::down(Some(e.to_string())));
                error!("Correlation store health check failed: {}", e);
            }
            Err(_) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert(store_key, ComponentHealth::down(Some("Timeout".to_string())));
                error!("Correlation store health check timed out");
            }
        }

        if self.gateway_configured {
            health_status
                .checks
                .insert("payflow_gateway".to_string(), ComponentHealth::up(None));
        } else {
            degraded = true;
            health_status.checks.insert(
                "payflow_gateway".to_string(),
                ComponentHealth::warning(None, Some("Missing PayFlow configuration".to_string())),
            );
            warn!("PayFlow gateway is not configured; STK push requests will fail");
        }

        health_status.status = if !overall_healthy {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }
}

pub async fn check_store_health(store: &dyn CorrelationStore) -> StoreResult<u128> {
    let start = Instant::now();
    store.health_check().await?;
    Ok(start.elapsed().as_millis())
}
