//! Logging utilities for the Beacon service.
//!
//! This module provides a standardized approach to logging across all crates
//! in the workspace. It includes functions for initializing the tracing
//! subscriber and small helpers for logging results and errors.
//!
//! Device tokens must only reach a log line through `DeviceToken`'s `Display` or
//! `Debug` impls, which print the redacted form.

use beacon_config::LoggingConfig;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
///
/// # Examples
///
/// ```
/// use beacon_common::logging;
///
/// logging::init();
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// Uses `try_init`, so calling this after a subscriber is already installed is a no-op.
pub fn init_with_level(level: Level) {
    let result = tracing_subscriber::registry()
        .with(stdout_layer())
        .with(build_filter(level))
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Initialize logging from the `logging` section of the configuration.
///
/// When a directory is configured, a daily rolling file is written next to stdout.
/// The returned guard flushes the file writer on drop and must be kept alive for
/// the life of the process.
pub fn init_from_config(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level = parse_level(&config.level);

    let Some(directory) = config.directory.as_deref() else {
        init_with_level(level);
        return None;
    };

    let appender = tracing_appender::rolling::daily(directory, "beacon.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = tracing_subscriber::registry()
        .with(stdout_layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(build_filter(level))
        .try_init();

    if result.is_ok() {
        info!(
            "Logging initialized at level: {} (file output in {})",
            level, directory
        );
    }
    Some(guard)
}

/// Parses a level name, falling back to INFO for anything unrecognised.
pub fn parse_level(level: &str) -> Level {
    match level.parse::<Level>() {
        Ok(level) => level,
        Err(_) => {
            warn!("Unknown log level '{}', using info", level);
            Level::INFO
        }
    }
}

fn stdout_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
}

fn build_filter(level: Level) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match format!("beacon={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}
