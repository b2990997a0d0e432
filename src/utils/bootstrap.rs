//! Bootstrap utilities for polytag binaries.
//!
//! Shared initialization code for report tools and Lambda entry points.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LOG_ENV_VAR, LOG_FORMAT_ENV_VAR};

/// Initialize tracing with the POLYTAG_LOG environment variable.
///
/// Defaults to "info" level if POLYTAG_LOG is not set. Set
/// POLYTAG_LOG_FORMAT=json for one JSON object per line, which is what
/// CloudWatch Logs Insights expects.
pub fn init_tracing() {
    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
