//! Tracing setup and log-safe formatting helpers

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set; `LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init_tracing_with(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry.with(fmt::layer().with_target(false)).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

/// Masks a phone number for logs, keeping the country prefix and last three digits.
pub fn mask_phone_number(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().collect();
    if digits.len() <= 6 {
        return "*".repeat(digits.len());
    }
    let head: String = digits[..3].iter().collect();
    let tail: String = digits[digits.len() - 3..].iter().collect();
    format!("{}{}{}", head, "*".repeat(digits.len() - 6), tail)
}
