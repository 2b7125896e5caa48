// src/logging.rs

//! Diagnostics setup for `setup-runner` using `tracing` + `tracing-subscriber`.
//!
//! This is the developer-facing log. The installer log users see lives in
//! [`crate::log`].
//!
//! Priority for determining the level:
//! 1. `--trace-level` CLI flag (if provided)
//! 2. `SETUP_RUNNER_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `warn`
//!
//! Diagnostics go to STDERR so stdout carries only the installer log.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::TraceLevel;

/// Environment variable consulted when `--trace-level` is absent.
pub const LOG_ENV_VAR: &str = "SETUP_RUNNER_LOG";

/// Initialise the global diagnostics subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<TraceLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_trace_level(lvl),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::WARN),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn level_from_trace_level(lvl: TraceLevel) -> tracing::Level {
    match lvl {
        TraceLevel::Error => tracing::Level::ERROR,
        TraceLevel::Warn => tracing::Level::WARN,
        TraceLevel::Info => tracing::Level::INFO,
        TraceLevel::Debug => tracing::Level::DEBUG,
        TraceLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
