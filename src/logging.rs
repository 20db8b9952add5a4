// src/logging.rs

//! Logging setup for `arisa` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. the level passed by the embedding program (e.g. from `[log].level`)
//! 2. `ARISA_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for whatever the
//! embedding program produces.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

use crate::types::LogLevel;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV_VAR: &str = "ARISA_LOG";

/// Initialise the global logging subscriber.
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level = resolve_level(level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Pick the effective level from an explicit choice and the raw value of
/// `ARISA_LOG`. Unparseable environment values fall back to `info`.
pub fn resolve_level(explicit: Option<LogLevel>, env_value: Option<&str>) -> LogLevel {
    match explicit {
        Some(lvl) => lvl,
        None => env_value
            .and_then(|s| s.parse::<LogLevel>().ok())
            .unwrap_or_default(),
    }
}
