//! Logging configuration and initialization
//!
//! This module sets up the tracing subscriber for structured logging
//! throughout the application.

use crate::core::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Normalize a configured log level into an `EnvFilter` directive
///
/// Only the first word is considered so inline comments in `.env` files are
/// tolerated. Unknown levels fall back to "info".
pub fn normalize_level(log_level: &str) -> &'static str {
    let level = log_level
        .split_whitespace()
        .next()
        .unwrap_or("info")
        .to_lowercase();

    match level.as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warning" | "warn" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level. Production output
/// is plain text without ANSI colours or module targets.
///
/// # Arguments
///
/// * `log_level` - The log level string (trace, debug, info, warning, error, critical)
/// * `environment` - Deployment mode selecting the output format
pub fn init_logging(log_level: &str, environment: Environment) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(log_level)));

    let production = environment.is_production();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(!production)
        .with_target(!production);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
