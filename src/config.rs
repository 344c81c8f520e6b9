//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Longest time a client keeps polling for one payment, in seconds.
pub const POLL_CEILING_SECS: u64 = 120;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which correlation store backend to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

/// Correlation store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    pub outcome_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            store: StoreConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
            outcome_ttl_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("CORRELATION_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis,
            _ => return Err(ConfigError::InvalidValue("CORRELATION_STORE".to_string())),
        };

        Ok(StoreConfig {
            backend,
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            outcome_ttl_secs: env::var("OUTCOME_TTL_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OUTCOME_TTL_SECONDS".to_string()))?,
            sweep_interval_secs: env::var("OUTCOME_SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("OUTCOME_SWEEP_INTERVAL_SECONDS".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // An outcome that expires before the client stops polling would look pending forever.
        if self.outcome_ttl_secs < POLL_CEILING_SECS {
            return Err(ConfigError::ValidationFailed(format!(
                "OUTCOME_TTL_SECONDS must be at least {}",
                POLL_CEILING_SECS
            )));
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "OUTCOME_SWEEP_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        if self.backend == StoreBackend::Redis {
            let url = self
                .redis_url
                .as_deref()
                .ok_or_else(|| ConfigError::MissingVariable("REDIS_URL".to_string()))?;
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::InvalidValue(
                    "REDIS_URL must start with redis:// or rediss://".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
