//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig, ObservabilityConfig};

/// Initialize the tracing subscriber with the given configuration.
///
/// This sets up:
/// - Console logging with configurable format (pretty, compact, JSON)
/// - Environment-based log filtering (`RUST_LOG` wins over config)
pub fn init_tracing(config: &ObservabilityConfig) {
    let logging = &config.logging;
    let filter = build_env_filter(logging);

    match (&logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        (LogFormat::Pretty, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        (LogFormat::Compact, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        (LogFormat::Compact, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        (LogFormat::Json, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        (LogFormat::Json, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
    }
}

/// Build the environment filter from logging config.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = config.level.as_str();

    // RUST_LOG wins over config so one-off debugging doesn't need a config edit
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        // Default filter that quiets noisy crates
        EnvFilter::new(format!(
            "{},hyper=warn,sqlx=warn,reqwest=warn",
            base_level
        ))
    }
}
